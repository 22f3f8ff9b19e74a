//! Error types for binary cache access.

use std::fmt;
use std::io;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced while opening or reading a `mime.cache` file.
#[derive(Debug)]
pub enum CacheError {
    Io(io::Error),
    /// The file's version header is not one this reader understands.
    UnsupportedVersion { major: u16, minor: u16 },
    /// A read past the end of the mapping. Offsets inside the file are
    /// untrusted, so this is how a corrupt cache usually shows up.
    OutOfBounds { offset: usize, len: usize },
    /// A string reference with no nul terminator or invalid UTF-8.
    BadString { offset: usize },
    /// Matchlet nesting deeper than any valid cache produces, which is
    /// how a cyclic child reference surfaces.
    NestingTooDeep { offset: usize },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "cache i/o error: {}", err),
            CacheError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported cache version {}.{}", major, minor)
            }
            CacheError::OutOfBounds { offset, len } => {
                write!(f, "cache read of {} bytes at offset {} out of bounds", len, offset)
            }
            CacheError::BadString { offset } => {
                write!(f, "bad string reference at offset {}", offset)
            }
            CacheError::NestingTooDeep { offset } => {
                write!(f, "matchlet nesting at offset {} exceeds the depth limit", offset)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        CacheError::Io(err)
    }
}
