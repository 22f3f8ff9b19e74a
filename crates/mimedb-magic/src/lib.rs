//! Content-based mimetype sniffing.
//!
//! Rules come from the shared `magic` database files: each rule names a
//! mimetype, a priority, and a tree of matchlets. A matchlet looks for a
//! byte sequence (optionally masked) inside an offset window of the input.
//! Sibling matchlets are alternatives, child matchlets are additional
//! requirements, so a rule fires when some root-to-satisfied path exists.
//!
//! [`MagicMatcher`] holds all rules sorted by descending priority and
//! returns the first hit. When no rule fires, a byte heuristic decides
//! between plain text and arbitrary binary data.

pub mod error;
pub mod parse;
pub mod rule;

pub use error::MagicError;
pub use parse::parse_magic_bytes;
pub use rule::{
    is_binary_data, match_window, ContentMatch, MagicMatcher, MagicRule, Matchlet, PriorityFilter,
};

/// Mimetype reported for zero-length input.
pub const ZERO_SIZE_TYPE: &str = "application/x-zerosize";

/// Catch-all mimetype when nothing else applies.
pub const DEFAULT_TYPE: &str = "application/octet-stream";

/// Mimetype reported by the text heuristic.
pub const PLAIN_TEXT_TYPE: &str = "text/plain";

/// Rules at or above this priority are considered certain matches.
pub const HIGH_PRIORITY_THRESHOLD: u8 = 80;
