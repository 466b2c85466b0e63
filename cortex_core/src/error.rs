//! Error types for the visual cortex core
//!
//! Only the internal plumbing returns these. The producer-facing publisher
//! turns every failure into a state change or a `PublishOutcome` instead.

use std::path::PathBuf;

/// Errors raised while acquiring, mapping or viewing the shared segment
#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shared segment '{path}' unavailable: {reason}")]
    SegmentUnavailable { path: PathBuf, reason: String },

    #[error("Shared memory is not supported on this platform ({0})")]
    Unsupported(&'static str),

    #[error("Range {offset}+{len} exceeds region capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Region base address is not aligned to {0} bytes")]
    Misaligned(usize),

    #[error("Invalid frame header: {0}")]
    InvalidHeader(String),
}

impl CortexError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        CortexError::Config(msg.into())
    }

    /// Create an invalid header error
    pub fn invalid_header<S: Into<String>>(msg: S) -> Self {
        CortexError::InvalidHeader(msg.into())
    }

    /// Create a segment unavailable error for `path`
    pub fn unavailable<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        CortexError::SegmentUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type CortexResult<T> = Result<T, CortexError>;
