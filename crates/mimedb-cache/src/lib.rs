//! Memory-mapped `mime.cache` index.
//!
//! The shared database ships a precompiled binary index next to its text
//! sources. This crate maps those files read-only and answers the same
//! queries the text path answers, without parsing anything up front:
//!
//! - filename lookups over the literal list, glob list and reverse suffix
//!   tree ([`CacheProvider::match_file_name`])
//! - content sniffing over the magic rule section
//!   ([`CacheProvider::match_data`])
//! - alias, parent, and icon lookups by binary search over sorted
//!   C-string tables
//!
//! All integers in the format are big-endian and all string references are
//! absolute byte offsets, so every accessor bounds-checks and returns a
//! [`CacheError`] on malformed input. Callers treat any error as "this
//! cache is unusable" and fall back to the text sources.

pub mod error;
pub mod provider;
pub mod view;

pub use error::CacheError;
pub use provider::CacheProvider;
pub use view::{CacheFile, CacheStorage};

/// Relative path of the binary index under a mime directory.
pub const CACHE_FILE_NAME: &str = "mime.cache";
