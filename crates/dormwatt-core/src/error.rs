//! Error types shared by every Dormwatt crate.

use std::path::PathBuf;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum DormwattError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The storage root does not exist. Deployment problem, never retried.
    #[error("Storage root not found: {}", .0.display())]
    StorageRootMissing(PathBuf),

    #[error("Security error: {0}")]
    Security(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DormwattError {
    /// Whether a retry loop should try again after this error.
    ///
    /// Network, upstream and auth failures are transient; configuration,
    /// storage and decoding problems will not fix themselves between attempts.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Channel(_) | Self::Upstream(_) | Self::AuthFailed(_) | Self::Io(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DormwattError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(DormwattError::Channel("timeout".into()).is_retryable());
        assert!(DormwattError::Upstream("502".into()).is_retryable());
        assert!(DormwattError::AuthFailed("expired".into()).is_retryable());
        assert!(!DormwattError::Config("missing".into()).is_retryable());
        assert!(!DormwattError::StorageRootMissing(PathBuf::from("/nope")).is_retryable());
    }

    #[test]
    fn test_root_missing_message_names_path() {
        let err = DormwattError::StorageRootMissing(PathBuf::from("./page/data"));
        assert!(err.to_string().contains("./page/data"));
    }
}
