//! Single compiled glob pattern.

use crate::error::{GlobError, Result};
use crate::CaseSensitivity;

/// Shape classification, decided once at compile time.
///
/// The classification rules are order-sensitive and deliberately mirror the
/// historical matcher: a pattern like `*a?b` is still treated as a suffix
/// comparison against the literal `a?b`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    /// Single leading `*`, no `[`: match by suffix (`*.txt`, `*~`).
    Suffix,
    /// Single trailing `*`: match by prefix (`README*`).
    Prefix,
    /// `*X*` with a wildcard-free middle: substring containment.
    Contains,
    /// No wildcard characters at all: exact equality.
    Literal,
    /// Everything else: full glob walk over parsed segments.
    Full(Vec<Segment>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Vec<char>),
    Star,
    Question,
    Class { items: Vec<ClassItem>, negated: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

impl ClassItem {
    fn contains(&self, c: char) -> bool {
        match *self {
            ClassItem::Char(m) => c == m,
            ClassItem::Range(lo, hi) => c >= lo && c <= hi,
        }
    }
}

/// A single glob pattern compiled for repeated matching.
///
/// Case-insensitive patterns are stored lowercased; [`GlobPattern::matches`]
/// lowercases the filename before comparing. Hot paths that already hold a
/// lowercased copy of the filename can use
/// [`GlobPattern::matches_prepared`] to avoid re-lowercasing per rule.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    text: String,
    case: CaseSensitivity,
    shape: Shape,
}

impl GlobPattern {
    /// Compile a pattern. Fails on empty patterns and unterminated
    /// character classes.
    pub fn new(pattern: &str, case: CaseSensitivity) -> Result<Self> {
        if pattern.is_empty() {
            return Err(GlobError::InvalidPattern("empty pattern".to_string()));
        }
        let text = match case {
            CaseSensitivity::Sensitive => pattern.to_string(),
            CaseSensitivity::Insensitive => pattern.to_lowercase(),
        };
        let shape = Self::classify(&text)?;
        Ok(Self { text, case, shape })
    }

    /// The pattern text (lowercased for case-insensitive patterns).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case sensitivity this pattern was compiled with.
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }

    /// Match a filename against this pattern.
    pub fn matches(&self, file_name: &str) -> bool {
        match self.case {
            CaseSensitivity::Sensitive => self.matches_text(file_name),
            CaseSensitivity::Insensitive => self.matches_text(&file_name.to_lowercase()),
        }
    }

    /// Match when the caller already holds both the original and a
    /// lowercased copy of the filename.
    pub fn matches_prepared(&self, file_name: &str, lower_file_name: &str) -> bool {
        match self.case {
            CaseSensitivity::Sensitive => self.matches_text(file_name),
            CaseSensitivity::Insensitive => self.matches_text(lower_file_name),
        }
    }

    fn matches_text(&self, name: &str) -> bool {
        match &self.shape {
            Shape::Suffix => name.ends_with(&self.text[1..]),
            Shape::Prefix => name.starts_with(&self.text[..self.text.len() - 1]),
            Shape::Contains => name.contains(&self.text[1..self.text.len() - 1]),
            Shape::Literal => name == self.text,
            Shape::Full(segments) => {
                let chars: Vec<char> = name.chars().collect();
                match_segments(segments, &chars)
            }
        }
    }

    fn classify(text: &str) -> Result<Shape> {
        let stars = text.matches('*').count();
        let has_class = text.contains('[');
        let has_question = text.contains('?');

        if stars == 1 && text.starts_with('*') && !has_class {
            return Ok(Shape::Suffix);
        }
        if stars == 1 && text.ends_with('*') && !has_class && !has_question {
            return Ok(Shape::Prefix);
        }
        if stars == 2 && text.len() > 2 && text.starts_with('*') && text.ends_with('*') {
            let middle = &text[1..text.len() - 1];
            if !middle.contains(['*', '?', '[']) {
                return Ok(Shape::Contains);
            }
        }
        if stars == 0 && !has_class && !has_question {
            return Ok(Shape::Literal);
        }
        Ok(Shape::Full(parse_segments(text)?))
    }
}

fn parse_segments(text: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                flush_literal(&mut segments, &mut literal);
                // Collapse runs of stars; "**" matches the same set as "*".
                if !matches!(segments.last(), Some(Segment::Star)) {
                    segments.push(Segment::Star);
                }
            }
            '?' => {
                flush_literal(&mut segments, &mut literal);
                segments.push(Segment::Question);
            }
            '[' => {
                flush_literal(&mut segments, &mut literal);
                segments.push(parse_class(text, &mut chars)?);
            }
            _ => literal.push(c),
        }
    }
    flush_literal(&mut segments, &mut literal);
    Ok(segments)
}

fn flush_literal(segments: &mut Vec<Segment>, literal: &mut Vec<char>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn parse_class(
    text: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<Segment> {
    let mut items = Vec::new();
    let negated = matches!(chars.peek(), Some('!') | Some('^'));
    if negated {
        chars.next();
    }
    let mut first = true;
    loop {
        let c = chars
            .next()
            .ok_or_else(|| GlobError::InvalidPattern(format!("unterminated class in {:?}", text)))?;
        // ']' as the very first member is literal, per glob(7).
        if c == ']' && !first {
            break;
        }
        first = false;
        if chars.peek() == Some(&'-') {
            let mut ahead = chars.clone();
            ahead.next(); // the '-'
            match ahead.peek() {
                Some(&hi) if hi != ']' => {
                    chars.next();
                    chars.next();
                    items.push(ClassItem::Range(c, hi));
                    continue;
                }
                _ => {}
            }
        }
        items.push(ClassItem::Char(c));
    }
    if items.is_empty() {
        return Err(GlobError::InvalidPattern(format!("empty class in {:?}", text)));
    }
    Ok(Segment::Class { items, negated })
}

fn match_segments(segments: &[Segment], text: &[char]) -> bool {
    match segments.first() {
        None => text.is_empty(),
        Some(Segment::Literal(lit)) => {
            text.len() >= lit.len()
                && text[..lit.len()] == lit[..]
                && match_segments(&segments[1..], &text[lit.len()..])
        }
        Some(Segment::Question) => {
            !text.is_empty() && match_segments(&segments[1..], &text[1..])
        }
        Some(Segment::Class { items, negated }) => {
            if let Some(&c) = text.first() {
                let inside = items.iter().any(|item| item.contains(c));
                inside != *negated && match_segments(&segments[1..], &text[1..])
            } else {
                false
            }
        }
        Some(Segment::Star) => {
            (0..=text.len()).any(|skip| match_segments(&segments[1..], &text[skip..]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(p: &str) -> GlobPattern {
        GlobPattern::new(p, CaseSensitivity::Sensitive).unwrap()
    }

    fn pat_ci(p: &str) -> GlobPattern {
        GlobPattern::new(p, CaseSensitivity::Insensitive).unwrap()
    }

    #[test]
    fn suffix_shape() {
        assert!(pat("*.txt").matches("notes.txt"));
        assert!(!pat("*.txt").matches("notes.txt.bak"));
        assert!(pat("*~").matches("notes.txt~"));
        assert!(!pat("*.txt").matches("notes.TXT"));
    }

    #[test]
    fn prefix_shape() {
        assert!(pat("README*").matches("README"));
        assert!(pat("README*").matches("README.foo"));
        assert!(!pat("README*").matches("modified-README"));
    }

    #[test]
    fn contains_shape() {
        assert!(pat("*win*").matches("darwin64"));
        assert!(!pat("*win*").matches("lose"));
    }

    #[test]
    fn literal_shape() {
        assert!(pat("Makefile").matches("Makefile"));
        assert!(!pat("Makefile").matches("makefile"));
    }

    #[test]
    fn case_insensitive() {
        assert!(pat_ci("*.TXT").matches("notes.txt"));
        assert!(pat_ci("*.txt").matches("NOTES.TXT"));
        assert!(pat_ci("makefile").matches("Makefile"));
    }

    #[test]
    fn full_glob_question() {
        assert!(pat("a?c").matches("abc"));
        assert!(!pat("a?c").matches("ac"));
        assert!(!pat("a?c").matches("abbc"));
    }

    #[test]
    fn full_glob_class() {
        let p = pat("[Mm]akefile");
        assert!(p.matches("Makefile"));
        assert!(p.matches("makefile"));
        assert!(!p.matches("Rakefile"));
    }

    #[test]
    fn full_glob_class_range() {
        let p = pat("track[0-9].ogg");
        assert!(p.matches("track5.ogg"));
        assert!(!p.matches("trackx.ogg"));
    }

    #[test]
    fn full_glob_negated_class() {
        let p = pat("[!.]*");
        assert!(p.matches("visible"));
        assert!(!p.matches(".hidden"));
    }

    #[test]
    fn two_stars() {
        // From the historical test suite: "*.ts.0*".
        let p = pat("*.ts.0*");
        assert!(p.matches("andre.ts.001"));
        assert!(!p.matches("andre.ts"));
    }

    #[test]
    fn lone_star_matches_everything() {
        assert!(pat("*").matches("anything"));
        assert!(pat("*").matches(""));
    }

    #[test]
    fn unterminated_class_is_rejected() {
        assert!(GlobPattern::new("foo[ab", CaseSensitivity::Sensitive).is_err());
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(GlobPattern::new("", CaseSensitivity::Sensitive).is_err());
    }
}
