//! Weight-ordered glob index with a fast extension map.

use std::collections::HashMap;

use crate::error::{GlobError, Result};
use crate::pattern::GlobPattern;
use crate::{CaseSensitivity, DEFAULT_WEIGHT};

/// Maximum weight a glob rule may carry.
pub const MAX_WEIGHT: u8 = 100;

/// One glob rule as declared by a database source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobRule {
    pub pattern: String,
    pub mime_type: String,
    pub weight: u8,
    pub case_sensitivity: CaseSensitivity,
}

impl GlobRule {
    pub fn new(pattern: &str, mime_type: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            mime_type: mime_type.to_string(),
            weight: DEFAULT_WEIGHT,
            case_sensitivity: CaseSensitivity::Insensitive,
        }
    }

    pub fn with_weight(mut self, weight: u8) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_case_sensitivity(mut self, case: CaseSensitivity) -> Self {
        self.case_sensitivity = case;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.pattern.is_empty() {
            return Err(GlobError::InvalidPattern("empty pattern".to_string()));
        }
        if self.pattern.contains(':') {
            return Err(GlobError::InvalidPattern(format!(
                "pattern {:?} contains a field separator",
                self.pattern
            )));
        }
        if self.mime_type.is_empty() || !self.mime_type.contains('/') {
            return Err(GlobError::InvalidPattern(format!(
                "bad mime type {:?} for pattern {:?}",
                self.mime_type, self.pattern
            )));
        }
        if self.weight > MAX_WEIGHT {
            return Err(GlobError::InvalidWeight(self.weight));
        }
        // Compile check, so a rule rejected here can never fail the build.
        GlobPattern::new(&self.pattern, self.case_sensitivity)?;
        Ok(())
    }

    /// Simple patterns (`*.ext` with no further wildcards) are eligible for
    /// the fast extension map.
    fn simple_extension(&self) -> Option<&str> {
        if self.case_sensitivity == CaseSensitivity::Sensitive {
            return None;
        }
        let ext = self.pattern.strip_prefix("*.")?;
        if ext.is_empty() || ext.contains(['*', '?', '[', '.']) {
            return None;
        }
        Some(ext)
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: GlobPattern,
    mime_type: String,
    weight: u8,
}

/// Accumulated result of a filename lookup.
///
/// `add_match` keeps the best contenders only: a higher weight replaces
/// everything seen so far, a longer pattern at equal weight replaces, an
/// equal-length pattern at equal weight appends.
#[derive(Debug, Default, Clone)]
pub struct GlobMatchResult {
    pub mime_types: Vec<String>,
    pub weight: u8,
    pub matching_pattern_len: usize,
    /// Extension from the winning `*.ext` pattern, when it had that form.
    pub found_suffix: Option<String>,
}

impl GlobMatchResult {
    pub fn add_match(&mut self, mime_type: &str, weight: u8, pattern: &str) {
        let pattern_len = pattern.chars().count();
        if !self.mime_types.is_empty() && weight < self.weight {
            return;
        }
        if !self.mime_types.is_empty()
            && weight == self.weight
            && pattern_len < self.matching_pattern_len
        {
            return;
        }
        if weight > self.weight || pattern_len > self.matching_pattern_len {
            self.mime_types.clear();
        }
        self.weight = weight;
        self.matching_pattern_len = pattern_len;
        self.found_suffix = simple_suffix(pattern).map(str::to_string);
        if !self.mime_types.iter().any(|m| m == mime_type) {
            self.mime_types.push(mime_type.to_string());
        }
    }
}

fn simple_suffix(pattern: &str) -> Option<&str> {
    let ext = pattern.strip_prefix("*.")?;
    if ext.is_empty() || ext.contains(['*', '?', '[']) {
        return None;
    }
    Some(ext)
}

/// Immutable glob index, built once via [`GlobIndexBuilder`].
///
/// Rules are split three ways as in the shared database design: a hash map
/// keyed by lowercased extension for the common `*.ext` case at default
/// weight, a high-weight list and a low-weight list, both sorted by
/// descending weight.
///
/// [`GlobIndexBuilder`]: crate::GlobIndexBuilder
#[derive(Debug, Default, Clone)]
pub struct GlobIndex {
    fast: HashMap<String, Vec<String>>,
    high: Vec<CompiledRule>,
    low: Vec<CompiledRule>,
}

impl GlobIndex {
    pub(crate) fn build(rules: Vec<GlobRule>) -> Result<Self> {
        let mut index = GlobIndex::default();
        for rule in rules {
            rule.validate()?;
            if rule.weight == DEFAULT_WEIGHT {
                if let Some(ext) = rule.simple_extension() {
                    index
                        .fast
                        .entry(ext.to_lowercase())
                        .or_default()
                        .push(rule.mime_type);
                    continue;
                }
            }
            let compiled = CompiledRule {
                pattern: GlobPattern::new(&rule.pattern, rule.case_sensitivity)?,
                mime_type: rule.mime_type,
                weight: rule.weight,
            };
            if rule.weight > DEFAULT_WEIGHT {
                index.high.push(compiled);
            } else {
                index.low.push(compiled);
            }
        }
        // Stable sort keeps source order within a weight class, so more
        // local sources stay ahead of more global ones.
        index.high.sort_by(|a, b| b.weight.cmp(&a.weight));
        index.low.sort_by(|a, b| b.weight.cmp(&a.weight));
        Ok(index)
    }

    pub fn is_empty(&self) -> bool {
        self.fast.is_empty() && self.high.is_empty() && self.low.is_empty()
    }

    /// Look up all glob matches for `file_name`, best ones first.
    pub fn match_file_name(&self, file_name: &str) -> GlobMatchResult {
        let mut result = GlobMatchResult::default();
        self.match_file_name_into(file_name, &mut result);
        result
    }

    /// Like [`GlobIndex::match_file_name`] but accumulates into an existing
    /// result, so several indexes can be merged.
    pub fn match_file_name_into(&self, file_name: &str, result: &mut GlobMatchResult) {
        let lower = file_name.to_lowercase();

        match_list(&self.high, file_name, &lower, result);

        // The fast map only gets a say when no high-weight rule matched.
        if result.mime_types.is_empty() {
            if let Some(dot) = lower.rfind('.') {
                let ext = &lower[dot + 1..];
                if !ext.is_empty() {
                    if let Some(mimes) = self.fast.get(ext) {
                        let pattern = format!("*.{ext}");
                        for mime in mimes {
                            result.add_match(mime, DEFAULT_WEIGHT, &pattern);
                        }
                    }
                }
            }
        }

        match_list(&self.low, file_name, &lower, result);
    }
}

/// Builder collecting rules from all database sources before compiling
/// them into a [`GlobIndex`].
#[derive(Debug, Default)]
pub struct GlobIndexBuilder {
    rules: Vec<GlobRule>,
}

impl GlobIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one rule. Validation happens up front so a bad declaration is
    /// reported against its source, not at build time.
    pub fn add_rule(&mut self, rule: GlobRule) -> Result<()> {
        rule.validate()?;
        self.rules.push(rule);
        Ok(())
    }

    /// Drop every rule accumulated so far for `mime_type`.
    ///
    /// A more local source can redeclare a type's globs from scratch this
    /// way (the `__NOGLOBS__` marker in the text format).
    pub fn remove_mime_type(&mut self, mime_type: &str) {
        self.rules.retain(|rule| rule.mime_type != mime_type);
    }

    /// Rules accumulated so far, in insertion order.
    pub fn rules(&self) -> &[GlobRule] {
        &self.rules
    }

    pub fn build(self) -> Result<GlobIndex> {
        GlobIndex::build(self.rules)
    }
}

fn match_list(
    rules: &[CompiledRule],
    file_name: &str,
    lower_file_name: &str,
    result: &mut GlobMatchResult,
) {
    for rule in rules {
        // Sorted by descending weight: once we hold a match, lower-weight
        // rules cannot improve it.
        if !result.mime_types.is_empty() && rule.weight < result.weight {
            break;
        }
        if rule.pattern.matches_prepared(file_name, lower_file_name) {
            result.add_match(&rule.mime_type, rule.weight, rule.pattern.text());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GlobIndexBuilder;

    fn index(rules: Vec<GlobRule>) -> GlobIndex {
        let mut builder = GlobIndexBuilder::new();
        for rule in rules {
            builder.add_rule(rule).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn simple_extension_lookup() {
        let idx = index(vec![GlobRule::new("*.txt", "text/plain")]);
        let result = idx.match_file_name("notes.txt");
        assert_eq!(result.mime_types, ["text/plain"]);
        assert_eq!(result.weight, DEFAULT_WEIGHT);
        assert_eq!(result.found_suffix.as_deref(), Some("txt"));
    }

    #[test]
    fn fast_map_is_case_insensitive() {
        let idx = index(vec![GlobRule::new("*.txt", "text/plain")]);
        let result = idx.match_file_name("REPORT.TXT");
        assert_eq!(result.mime_types, ["text/plain"]);
    }

    #[test]
    fn longest_pattern_wins_at_equal_weight() {
        let idx = index(vec![
            GlobRule::new("*.gz", "application/gzip"),
            GlobRule::new("*.tar.gz", "application/x-compressed-tar"),
        ]);
        let result = idx.match_file_name("archive.tar.gz");
        assert_eq!(result.mime_types, ["application/x-compressed-tar"]);
        assert_eq!(result.found_suffix.as_deref(), Some("tar.gz"));
    }

    #[test]
    fn weight_dominates_pattern_length() {
        let idx = index(vec![
            GlobRule::new("*.long.pattern.ext", "application/x-long").with_weight(40),
            GlobRule::new("*.ext", "application/x-short").with_weight(60),
        ]);
        let result = idx.match_file_name("file.long.pattern.ext");
        assert_eq!(result.mime_types, ["application/x-short"]);
        assert_eq!(result.weight, 60);
    }

    #[test]
    fn equal_weight_and_length_collects_all() {
        let idx = index(vec![
            GlobRule::new("*.sub", "text/x-microdvd"),
            GlobRule::new("*.sub", "text/x-mpsub"),
        ]);
        let result = idx.match_file_name("movie.sub");
        assert_eq!(result.mime_types.len(), 2);
    }

    #[test]
    fn high_weight_list_consulted_first() {
        let idx = index(vec![
            GlobRule::new("*.doc", "application/msword"),
            GlobRule::new("*.doc", "application/x-important").with_weight(90),
        ]);
        let result = idx.match_file_name("letter.doc");
        assert_eq!(result.mime_types, ["application/x-important"]);
        assert_eq!(result.weight, 90);
    }

    #[test]
    fn case_sensitive_rule_skips_fast_map() {
        let idx = index(vec![GlobRule::new("*.C", "text/x-c++src")
            .with_case_sensitivity(CaseSensitivity::Sensitive)]);
        assert_eq!(idx.match_file_name("prog.C").mime_types, ["text/x-c++src"]);
        assert!(idx.match_file_name("prog.c").mime_types.is_empty());
    }

    #[test]
    fn low_weight_glob_shapes_still_match() {
        let idx = index(vec![
            GlobRule::new("[Mm]akefile", "text/x-makefile").with_weight(50),
        ]);
        // Not a simple extension: lands in a list, not the fast map.
        assert_eq!(
            idx.match_file_name("Makefile").mime_types,
            ["text/x-makefile"]
        );
    }

    #[test]
    fn star_dot_star_patterns() {
        let idx = index(vec![GlobRule::new("*.ts.0*", "video/mpeg")]);
        assert_eq!(idx.match_file_name("andre.ts.001").mime_types, ["video/mpeg"]);
        assert!(idx.match_file_name("andre.ts").mime_types.is_empty());
    }

    #[test]
    fn no_match_yields_empty_result() {
        let idx = index(vec![GlobRule::new("*.txt", "text/plain")]);
        let result = idx.match_file_name("binary.bin");
        assert!(result.mime_types.is_empty());
        assert_eq!(result.weight, 0);
    }

    #[test]
    fn invalid_weight_rejected() {
        let mut builder = GlobIndexBuilder::new();
        let err = builder.add_rule(GlobRule::new("*.x", "a/b").with_weight(101));
        assert!(err.is_err());
    }
}
