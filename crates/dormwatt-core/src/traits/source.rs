//! Upstream reading source.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Balances;

/// Where balances come from.
///
/// Transient network/auth failures must surface as retryable errors
/// (see [`crate::error::DormwattError::is_retryable`]); the caller wraps
/// every call in a retry policy.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_balances(&self) -> Result<Balances>;
}
