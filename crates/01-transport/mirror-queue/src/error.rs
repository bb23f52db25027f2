//! Error handling helpers for the mirror queue.
//!
//! Only construction can fail. Once a queue exists, every data-path operation
//! reports a byte count, and "no space" is a zero rather than an error.

use thiserror::Error;

/// Convenience result alias for fallible queue operations.
pub type QueueResult<T, E = QueueError> = Result<T, E>;

/// Errors surfaced while creating or attaching to a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The requested capacity cannot be rounded to a power-of-two, page-multiple size.
    #[error("requested capacity {requested} cannot be rounded to a mappable size")]
    InvalidCapacity { requested: usize },

    /// The shared memory name does not follow the `/name` convention.
    #[error("invalid shared memory name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A system call (`shm_open`, `ftruncate`, `mmap`, ...) failed.
    #[error("{op} failed for `{name}`: {source}")]
    Os {
        op: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The named object exists but no queue header has been published in it.
    #[error("shared memory `{name}` does not contain an initialised queue")]
    NotInitialised { name: String },

    /// The named object is not the size its header claims.
    #[error("shared memory `{name}` is {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// Mirrored mappings are not available on this target.
    #[error("mirrored mappings are not supported on this platform")]
    Unsupported,
}

impl QueueError {
    pub(crate) fn os(op: &'static str, name: &str, source: impl Into<std::io::Error>) -> Self {
        QueueError::Os {
            op,
            name: name.to_owned(),
            source: source.into(),
        }
    }
}
