//! Error types for volscope-rs.

use thiserror::Error;

/// Errors raised while decoding a VL volume container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The buffer is shorter than the fixed 36-byte header.
    #[error("VL container truncated: {len} bytes is shorter than the 36-byte header")]
    Truncated { len: usize },

    /// The header carries a version this build cannot read.
    #[error("unsupported VL container version {0}")]
    UnsupportedVersion(u32),

    /// The payload length disagrees with the header dimensions.
    #[error("VL payload size mismatch: expected {expected} bytes, got {actual}")]
    PayloadSize { expected: usize, actual: usize },
}

/// The main error type for volscope-rs operations.
#[derive(Error, Debug)]
pub enum VolscopeError {
    /// Malformed or unsupported binary container.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A voxel grid violates its geometric or byte-length invariant.
    #[error("invalid voxel grid: {reason}")]
    InvalidGrid { reason: String },

    /// A GPU resource could not be (re)allocated.
    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),

    /// The caller broke an operation's contract (index out of range, bad channel, ...).
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A named registry entry does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Rendering or readback failed.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VolscopeError {
    pub(crate) fn invalid_grid(reason: impl Into<String>) -> Self {
        Self::InvalidGrid {
            reason: reason.into(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}

/// A specialized Result type for volscope-rs operations.
pub type Result<T> = std::result::Result<T, VolscopeError>;
