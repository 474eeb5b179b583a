//! Common error types for Quaver

use thiserror::Error;

/// Common result type for Quaver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Quaver playback core
#[derive(Error, Debug)]
pub enum Error {
    /// A metadata fetch failed while expanding a play source
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Folder traversal exceeded the configured depth cap
    #[error("folder recursion exceeded maximum depth of {0}")]
    RecursionDepth(usize),

    /// A playback slot failed to load a stream source
    #[error("slot failed to load {locator}: {reason}")]
    SlotLoad { locator: String, reason: String },

    /// Operation invalid in the current playback state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
