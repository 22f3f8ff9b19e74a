//! Error types for magic rule parsing.

use std::fmt;

/// Result type alias for magic operations.
pub type Result<T> = std::result::Result<T, MagicError>;

/// Errors produced while reading a `magic` database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MagicError {
    /// The file does not start with the `MIME-Magic\0\n` header.
    BadHeader,
}

impl fmt::Display for MagicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MagicError::BadHeader => write!(f, "missing MIME-Magic header"),
        }
    }
}

impl std::error::Error for MagicError {}
