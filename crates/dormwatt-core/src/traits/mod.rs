//! Seams between the core engine and its collaborators.

pub mod notifier;
pub mod secrets;
pub mod source;

pub use notifier::{Notifier, OutgoingMessage};
pub use secrets::SecretStore;
pub use source::ReadingSource;
