//! Error types for repsync-store.

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from the structured backend.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error from the key-value backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error from the key-value backend file format.
    #[error("key-value file error: {0}")]
    Json(#[from] serde_json::Error),

    /// Event encoding/decoding failed.
    #[error("event encoding error: {0}")]
    Wire(#[from] repsync_types::WireError),

    /// A stored row could not be mapped back to a record.
    #[error("stored record is corrupt: {context}")]
    Corrupt {
        /// Which record could not be decoded.
        context: String,
    },

    /// Both the structured backend and the key-value fallback failed to
    /// initialize. Fatal: the caller must surface recovery guidance
    /// (reinstall/reset) rather than run without persistence.
    #[error("no usable storage backend (structured: {primary}; fallback: {fallback})")]
    Unrecoverable {
        /// Why the structured backend failed.
        primary: String,
        /// Why the key-value fallback failed.
        fallback: String,
    },
}

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }

    #[test]
    fn unrecoverable_names_both_causes() {
        let err = StoreError::Unrecoverable {
            primary: "disk full".into(),
            fallback: "read-only filesystem".into(),
        };
        let text = err.to_string();
        assert!(text.contains("disk full"));
        assert!(text.contains("read-only filesystem"));
    }
}
