//! Text format for glob declarations.
//!
//! Two line layouts are accepted, matching the shared database files:
//!
//! - `globs` (version 1): `mime/type:pattern`
//! - `globs2` (version 2): `weight:mime/type:pattern[:flags]`
//!
//! Lines starting with `#` are comments. The special pattern `__NOGLOBS__`
//! removes all previously accumulated rules for its mimetype, so a more
//! local source can override a more global one.

use crate::index::{GlobIndexBuilder, GlobRule};
use crate::CaseSensitivity;

/// Marker pattern that clears earlier rules for a mimetype.
pub const NOGLOBS_MARKER: &str = "__NOGLOBS__";

/// Parse one `globs`/`globs2` file body into `builder`.
///
/// Malformed lines are skipped rather than failing the whole file; the
/// number of skipped lines is returned so callers can log it.
pub fn parse_glob_lines(builder: &mut GlobIndexBuilder, content: &str) -> usize {
    let mut skipped = 0;
    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some(ParsedLine::Rule(rule)) => {
                if builder.add_rule(rule).is_err() {
                    skipped += 1;
                }
            }
            Some(ParsedLine::NoGlobs(mime_type)) => builder.remove_mime_type(&mime_type),
            None => skipped += 1,
        }
    }
    skipped
}

enum ParsedLine {
    Rule(GlobRule),
    NoGlobs(String),
}

fn parse_line(line: &str) -> Option<ParsedLine> {
    let fields: Vec<&str> = line.split(':').collect();
    let (weight, mime_type, pattern, flags) = match fields.as_slice() {
        [mime, pattern] => (crate::DEFAULT_WEIGHT, *mime, *pattern, ""),
        [weight, mime, pattern] => (weight.parse().ok()?, *mime, *pattern, ""),
        [weight, mime, pattern, flags] => (weight.parse().ok()?, *mime, *pattern, *flags),
        _ => return None,
    };
    if mime_type.is_empty() || pattern.is_empty() {
        return None;
    }
    if pattern == NOGLOBS_MARKER {
        return Some(ParsedLine::NoGlobs(mime_type.to_string()));
    }
    let case = if flags.split(',').any(|f| f == "cs") {
        CaseSensitivity::Sensitive
    } else {
        CaseSensitivity::Insensitive
    };
    Some(ParsedLine::Rule(
        GlobRule::new(pattern, mime_type)
            .with_weight(weight)
            .with_case_sensitivity(case),
    ))
}
