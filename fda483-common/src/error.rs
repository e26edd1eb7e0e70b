//! Common error types for the FDA 483 classifier workspace

use thiserror::Error;

/// Common result type for fda483 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the fda483 crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input batch could not be read at all (fatal for a run)
    #[error("Input unavailable: {0}")]
    InputUnavailable(String),

    /// Invalid user input or malformed record
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
