//! Opaque secret persistence (session tokens and the like).

use crate::error::Result;

/// Stores one secret blob at rest.
pub trait SecretStore: Send + Sync {
    fn save(&self, blob: &[u8]) -> Result<()>;

    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<u8>>>;

    fn clear(&self) -> Result<()>;
}
