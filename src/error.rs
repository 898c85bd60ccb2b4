//! Error types for fragment extraction.

use thiserror::Error;

/// Errors that can occur while extracting fragments.
#[derive(Debug, Error)]
pub enum Error {
    /// A constructor argument was missing or unusable. Raised before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Reading the document failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed markup, only reported when recovery is disabled.
    #[error("malformed input at byte {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    /// The background scan thread panicked.
    #[error("background scan stopped unexpectedly")]
    WorkerPanicked,
}

impl Error {
    /// Create a malformed-input error.
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
