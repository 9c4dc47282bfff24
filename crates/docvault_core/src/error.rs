//! Error types for docvault core.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised inside the persistence engine.
///
/// These are the fine-grained causes. The [`BackupService`](crate::BackupService)
/// folds them into a [`ServiceError`](crate::ServiceError) before they leave
/// the crate's façade.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] docvault_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The candidate document was rejected before any I/O happened.
    #[error("invalid document: {message}")]
    Validation {
        /// Why the candidate was rejected.
        message: String,
    },

    /// No document has ever been saved.
    #[error("no document has been saved yet")]
    NotFound,

    /// On-disk state cannot be trusted. Never repaired automatically.
    #[error("corrupted state: {message}")]
    Corruption {
        /// What was found to be inconsistent.
        message: String,
    },

    /// The write lock is held and the policy is fail-fast.
    #[error("another save is in progress")]
    Busy,

    /// The write lock could not be acquired in time.
    #[error("timed out after {waited:?} waiting for the write lock")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// Recording the revision failed after the document was written.
    #[error("commit failed: {message}")]
    Commit {
        /// Description of the failure.
        message: String,
    },

    /// No revision matches the requested handle.
    #[error("revision not found: {handle}")]
    RevisionNotFound {
        /// The handle or prefix that was looked up.
        handle: String,
    },

    /// A handle prefix matches more than one revision.
    #[error("revision handle '{prefix}' is ambiguous")]
    AmbiguousHandle {
        /// The prefix that was looked up.
        prefix: String,
    },

    /// Another process owns the vault directory.
    #[error("vault locked: another process has exclusive access to {}", .path.display())]
    DirectoryLocked {
        /// The locked vault root.
        path: PathBuf,
    },

    /// The configuration cannot be used.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates a commit error.
    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_details() {
        let err = CoreError::Timeout {
            waited: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("250ms"));

        let err = CoreError::validation("top level must be an object or array");
        assert_eq!(
            err.to_string(),
            "invalid document: top level must be an object or array"
        );
    }

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = docvault_storage::StorageError::TruncateBeyondEnd {
            requested: 4,
            size: 2,
        }
        .into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
