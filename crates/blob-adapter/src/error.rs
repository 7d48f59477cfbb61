//! Error types for the blob adapter.

use crate::store::StoreError;

/// Errors surfaced to the host by the adapter handlers.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Missing credential, malformed prefix or unusable public base URL
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Filename or prefix does not form a safe storage key
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The remote store rejected the credential
    #[error("remote store rejected credentials for '{key}': {source}")]
    AuthFailure {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Object absent on fetch
    #[error("object not found: {0}")]
    NotFound(String),

    /// Write rejected or failed in transit
    #[error("upload of '{key}' failed: {source}")]
    UploadFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Removal rejected or failed in transit
    #[error("delete of '{key}' failed: {source}")]
    DeleteFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Read for static serving failed
    #[error("fetch of '{key}' failed: {source}")]
    FetchFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Readiness probe against the backend failed
    #[error("remote store unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

impl AdapterError {
    pub(crate) fn upload(key: &str, source: StoreError) -> Self {
        match source {
            StoreError::Unauthorized(_) => Self::AuthFailure {
                key: key.to_string(),
                source,
            },
            source => Self::UploadFailed {
                key: key.to_string(),
                source,
            },
        }
    }

    pub(crate) fn delete(key: &str, source: StoreError) -> Self {
        match source {
            StoreError::Unauthorized(_) => Self::AuthFailure {
                key: key.to_string(),
                source,
            },
            source => Self::DeleteFailed {
                key: key.to_string(),
                source,
            },
        }
    }

    pub(crate) fn fetch(key: &str, source: StoreError) -> Self {
        match source {
            StoreError::NotFound(_) => Self::NotFound(key.to_string()),
            StoreError::Unauthorized(_) => Self::AuthFailure {
                key: key.to_string(),
                source,
            },
            source => Self::FetchFailed {
                key: key.to_string(),
                source,
            },
        }
    }

    /// Whether the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_auth_failure_for_every_operation() {
        let upload = AdapterError::upload("media/a.png", StoreError::Unauthorized("bad".into()));
        let delete = AdapterError::delete("media/a.png", StoreError::Unauthorized("bad".into()));
        let fetch = AdapterError::fetch("media/a.png", StoreError::Unauthorized("bad".into()));

        assert!(matches!(upload, AdapterError::AuthFailure { .. }));
        assert!(matches!(delete, AdapterError::AuthFailure { .. }));
        assert!(matches!(fetch, AdapterError::AuthFailure { .. }));
    }

    #[test]
    fn test_fetch_not_found() {
        let err = AdapterError::fetch("media/a.png", StoreError::NotFound("media/a.png".into()));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "object not found: media/a.png");
    }

    #[test]
    fn test_upload_rejection_keeps_key() {
        let err = AdapterError::upload(
            "media/a.png",
            StoreError::Rejected {
                status: 413,
                message: "too large".into(),
            },
        );
        match err {
            AdapterError::UploadFailed { key, .. } => assert_eq!(key, "media/a.png"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
