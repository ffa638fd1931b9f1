//! Artifact Store Adapter error taxonomy (C1).

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors a storage operation can fail with. `Transient` is the only variant a
/// caller should retry; `NotFound`/`PermissionDenied`/`Fatal` are terminal for the
/// calling render job.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to configure storage client: {0}")]
    Config(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("permission denied for {0}")]
    PermissionDenied(String),

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage operation failed: {0}")]
    Fatal(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Classify an AWS SDK error string into the C1 taxonomy. The SDK's error
    /// `Display` text is the only thing consistently available across the
    /// `put_object`/`get_object`/`copy_object`/`head_object` call families.
    pub fn from_aws(op: &str, err: impl std::fmt::Display) -> Self {
        let text = err.to_string();
        if text.contains("NoSuchKey") || text.contains("NotFound") {
            Self::NotFound(format!("{op}: {text}"))
        } else if text.contains("AccessDenied") || text.contains("Forbidden") {
            Self::PermissionDenied(format!("{op}: {text}"))
        } else if text.contains("timeout")
            || text.contains("dispatch failure")
            || text.contains("connection")
            || text.contains("ServiceUnavailable")
            || text.contains("SlowDown")
            || text.contains("RequestTimeout")
        {
            Self::Transient(format!("{op}: {text}"))
        } else {
            Self::Fatal(format!("{op}: {text}"))
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_key_as_not_found() {
        let err = StorageError::from_aws("get_object", "NoSuchKey: the key does not exist");
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn classifies_timeout_as_transient() {
        let err = StorageError::from_aws("put_object", "request dispatch failure: timeout");
        assert!(matches!(err, StorageError::Transient(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn classifies_access_denied_as_permission_denied() {
        let err = StorageError::from_aws("put_object_acl", "AccessDenied: not authorized");
        assert!(matches!(err, StorageError::PermissionDenied(_)));
    }

    #[test]
    fn unrecognized_errors_are_fatal() {
        let err = StorageError::from_aws("put_object", "InternalError: something broke");
        assert!(matches!(err, StorageError::Fatal(_)));
        assert!(!err.is_retryable());
    }
}
