//! Shared-memory channel error types.

use std::io;
use thiserror::Error;

/// Errors surfaced by region lifecycle and configuration operations.
///
/// Per-packet delivery failures (timeout, ring full, region torn down) are
/// reported through the `bool` hot-path contract of the engine, not through
/// this type.
#[derive(Debug, Error)]
pub enum ShmError {
    /// The region configuration cannot describe a usable region.
    #[error("invalid region configuration: {0}")]
    InvalidConfig(String),

    /// `shm_open` with create semantics failed.
    #[error("failed to create shared memory region `{name}`: {source}")]
    Create {
        /// Region name.
        name: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// `shm_open` on an existing region failed (commonly: not created yet).
    #[error("failed to open shared memory region `{name}`: {source}")]
    Open {
        /// Region name.
        name: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// `ftruncate` or `mmap` failed.
    #[error("failed to map shared memory region `{name}`: {source}")]
    Map {
        /// Region name.
        name: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The region exists but its header is not (or no longer) valid.
    #[error("shared memory region `{name}` is not valid")]
    RegionInvalid {
        /// Region name.
        name: String,
    },

    /// A process-shared synchronization object could not be initialized.
    #[error("failed to initialize process-shared {what}")]
    SyncInit {
        /// Which object failed ("mutex", "condvar").
        what: &'static str,
    },
}

impl ShmError {
    /// Invalid-configuration constructor.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        ShmError::InvalidConfig(reason.into())
    }

    /// Whether retrying the operation later can succeed.
    ///
    /// The subscriber's attach loop sleeps and retries on these; any other
    /// error means no future publisher session can help, and the worker
    /// gives up instead of spinning.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShmError::Open { .. } | ShmError::Map { .. } | ShmError::RegionInvalid { .. }
        )
    }
}

/// Specialized `Result` for shared-memory operations.
pub type ShmResult<T> = std::result::Result<T, ShmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShmError::invalid_config("capacity must be nonzero");
        assert_eq!(
            err.to_string(),
            "invalid region configuration: capacity must be nonzero"
        );
    }

    #[test]
    fn test_retryable_classification() {
        let err = ShmError::Open {
            name: "demo".into(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert!(err.is_retryable());
        assert!(!ShmError::SyncInit { what: "mutex" }.is_retryable());
    }
}
