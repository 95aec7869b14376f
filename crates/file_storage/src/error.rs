//! Error types for storage adapter operations.

/// Result type for storage adapter operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage adapter operations.
///
/// A missing object is only an error for operations that cannot produce a
/// meaningful result without it (`download`, `copy`, signing). Metadata
/// lookups, existence checks and deletes report absence through their return
/// value instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No object is stored at the given key.
    #[error("File not found: {key}")]
    NotFound { key: String },

    /// The backend does not offer the requested capability.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// A required configuration parameter is missing or invalid.
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// The key cannot be mapped to a backend address.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// The requested byte range is malformed.
    #[error("Invalid byte range {start_byte}-{end_byte}: {reason}")]
    InvalidRange {
        start_byte: u64,
        end_byte: u64,
        reason: String,
    },

    /// Signed URL generation failed or was given invalid options.
    #[error("Signed URL generation error: {reason}")]
    Presign { reason: String },

    /// Local I/O error, including errors raised while reading input content.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Metadata could not be encoded or decoded.
    #[error("Metadata encoding error: {source}")]
    Metadata {
        #[from]
        source: serde_json::Error,
    },

    /// Error reported by the backend's native client.
    #[error("{backend} backend error: {source}")]
    Backend {
        backend: &'static str,
        source: anyhow::Error,
    },

    /// Deleting the source of a move failed; the destination copy was removed
    /// again and the source is intact.
    #[error(
        "Move from '{source_key}' to '{destination_key}' failed while deleting the source: {cause}"
    )]
    MoveFailed {
        source_key: String,
        destination_key: String,
        cause: Box<StorageError>,
    },

    /// Deleting the source of a move failed and removing the destination copy
    /// failed as well. Both objects may now exist.
    #[error(
        "Move from '{source_key}' to '{destination_key}' failed while deleting the source: \
         {cause}; rollback of the destination also failed: {rollback}. \
         A duplicate may now exist at '{destination_key}'"
    )]
    MoveRollbackFailed {
        source_key: String,
        destination_key: String,
        cause: Box<StorageError>,
        rollback: Box<StorageError>,
    },
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(backend: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Backend {
            backend,
            source: source.into(),
        }
    }

    /// True when the error reports a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the backend lacks the capability. These errors are
    /// permanent for a given backend and must not be retried.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// True for failures of a move whose source could not be removed.
    pub fn is_move_failure(&self) -> bool {
        matches!(
            self,
            Self::MoveFailed { .. } | Self::MoveRollbackFailed { .. }
        )
    }
}
