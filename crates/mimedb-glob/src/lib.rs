//! Filename glob matching for mimetype resolution.
//!
//! This crate implements the filename side of mimetype detection: glob
//! patterns (`*.txt`, `Makefile.*`, `[Mm]akefile`), weighted rules, and the
//! ordered matching algorithm that turns a filename into a set of candidate
//! mimetype names.
//!
//! The matcher is split into two layers:
//!
//! - [`GlobPattern`]: a single compiled pattern. Common shapes (suffix,
//!   prefix, literal) are classified at construction time and matched with
//!   plain string comparisons; everything else falls back to a full glob
//!   walk supporting `*`, `?` and `[...]` character classes.
//! - [`GlobIndex`]: the weighted rule table. Built once from parsed `globs`
//!   resources, then queried read-only. Weight-50 case-insensitive `*.ext`
//!   rules live in a direct extension map; all other rules are kept in two
//!   priority-sorted lists scanned with an early weight cut-off.

pub mod error;
pub mod index;
pub mod parse;
pub mod pattern;

pub use error::GlobError;
pub use index::{GlobIndex, GlobIndexBuilder, GlobMatchResult, GlobRule};
pub use parse::parse_glob_lines;
pub use pattern::GlobPattern;

/// Default rule weight when a glob declaration carries none.
pub const DEFAULT_WEIGHT: u8 = 50;

/// Case sensitivity of a single glob rule.
///
/// Case-insensitive rules lowercase both the pattern (at compile time) and
/// the filename (at match time) before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    /// `abc` matches `abc` but not `ABC`.
    Sensitive,
    /// `abc` matches `ABC`, `Abc`, etc.
    Insensitive,
}
