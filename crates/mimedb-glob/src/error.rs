//! Error types for glob rule handling.

use std::fmt;

/// Result type alias for glob operations.
pub type Result<T> = std::result::Result<T, GlobError>;

/// Errors produced while compiling glob patterns or rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobError {
    /// Pattern text is structurally invalid (empty, contains `:`, or has an
    /// unterminated character class).
    InvalidPattern(String),
    /// Rule weight is above the allowed maximum of 100.
    InvalidWeight(u8),
}

impl fmt::Display for GlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobError::InvalidPattern(msg) => write!(f, "invalid glob pattern: {}", msg),
            GlobError::InvalidWeight(w) => write!(f, "glob weight {} above maximum 100", w),
        }
    }
}

impl std::error::Error for GlobError {}
