//! Top-level error type.

use thiserror::Error;

/// Errors surfaced by database operations that touch the filesystem.
///
/// Lookup operations themselves never fail for "unknown type"; every
/// resolve path has a defined terminal fallback. This type covers the
/// I/O-facing entry points and wraps the component crates' errors.
#[derive(Debug, Error)]
pub enum MimeDbError {
    #[error(transparent)]
    Glob(#[from] mimedb_glob::GlobError),
    #[error(transparent)]
    Magic(#[from] mimedb_magic::MagicError),
    #[error(transparent)]
    Cache(#[from] mimedb_cache::CacheError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
