//! Engine-specific error types.

use thiserror::Error;

/// Errors surfaced by graph construction and pipeline lifecycle operations.
///
/// Hot-path delivery (`Pad::push`, `process_packet`) reports failure through
/// its `bool` return instead; these errors cover the build-and-start surface
/// where callers can actually react.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No pad with the requested name (and kind, if filtered) exists.
    #[error("pad `{name}` not found")]
    PadNotFound {
        /// Requested pad name.
        name: String,
    },

    /// Pad index past the end of the node's pad list.
    #[error("pad index {index} out of range (node has {count} pads)")]
    PadIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of pads on the node.
        count: usize,
    },

    /// The owning node was dropped while a pad handle was still in use.
    #[error("owning node no longer exists")]
    NodeGone,

    /// A pad failed to start while the pipeline was starting.
    #[error("pad start failed for node {node}")]
    PadStartFailed {
        /// Index of the failing node in pipeline order.
        node: usize,
    },

    /// A node's user start hook failed while the pipeline was starting.
    #[error("start hook failed for node {node}: {reason}")]
    NodeStartFailed {
        /// Index of the failing node in pipeline order.
        node: usize,
        /// Rendered cause from the hook.
        reason: String,
    },
}

impl EngineError {
    /// Create a [`EngineError::PadNotFound`].
    pub fn pad_not_found(name: impl Into<String>) -> Self {
        EngineError::PadNotFound { name: name.into() }
    }

    /// Whether the error was raised during pipeline start (as opposed to
    /// graph construction).
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            EngineError::PadStartFailed { .. } | EngineError::NodeStartFailed { .. }
        )
    }
}

/// Specialized `Result` for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
