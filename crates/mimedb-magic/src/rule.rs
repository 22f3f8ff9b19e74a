//! Magic rules and the matcher over them.

use crate::{
    DEFAULT_TYPE, HIGH_PRIORITY_THRESHOLD, PLAIN_TEXT_TYPE, ZERO_SIZE_TYPE,
};

/// One node in a rule's matchlet tree.
///
/// The node matches when its own byte check succeeds and either it has no
/// children or at least one child matches in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matchlet {
    /// First input offset the value may start at.
    pub range_start: usize,
    /// Number of admissible start offsets (so the value may begin anywhere
    /// in `range_start..range_start + range_length`).
    pub range_length: usize,
    /// Bytes to look for, already byte-swapped to match the input.
    pub value: Vec<u8>,
    /// Optional mask, same length as `value`.
    pub mask: Option<Vec<u8>>,
    pub children: Vec<Matchlet>,
}

impl Matchlet {
    pub fn matches(&self, data: &[u8]) -> bool {
        if !match_window(
            data,
            self.range_start,
            self.range_length,
            &self.value,
            self.mask.as_deref(),
        ) {
            return false;
        }
        self.children.is_empty() || self.children.iter().any(|child| child.matches(data))
    }
}

/// Check for `value` starting anywhere in `range_start..range_start +
/// range_length` of `data`.
///
/// The unmasked case is a bounded substring search; the masked case
/// compares byte by byte under `(data & mask) == (value & mask)`.
pub fn match_window(
    data: &[u8],
    range_start: usize,
    range_length: usize,
    value: &[u8],
    mask: Option<&[u8]>,
) -> bool {
    if value.is_empty() || range_length == 0 || range_start >= data.len() {
        return false;
    }
    let window_end = range_start
        .saturating_add(range_length)
        .saturating_add(value.len() - 1)
        .min(data.len());
    let window = &data[range_start..window_end];

    match mask {
        None => window
            .windows(value.len())
            .take(range_length)
            .any(|w| w == value),
        Some(mask) => {
            if mask.len() != value.len() {
                return false;
            }
            if window.len() < value.len() {
                return false;
            }
            let last_start = (window.len() - value.len()).min(range_length - 1);
            (0..=last_start).any(|start| {
                window[start..start + value.len()]
                    .iter()
                    .zip(value)
                    .zip(mask)
                    .all(|((&d, &v), &m)| d & m == v & m)
            })
        }
    }
}

/// One sniffing rule: fires when any root matchlet matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicRule {
    pub mime_type: String,
    pub priority: u8,
    pub matchlets: Vec<Matchlet>,
}

impl MagicRule {
    pub fn matches(&self, data: &[u8]) -> bool {
        self.matchlets.iter().any(|m| m.matches(data))
    }

    /// Furthest input byte this rule can inspect.
    pub fn extent(&self) -> usize {
        fn walk(m: &Matchlet) -> usize {
            let own = m.range_start + m.range_length + m.value.len();
            m.children.iter().map(walk).max().unwrap_or(0).max(own)
        }
        self.matchlets.iter().map(walk).max().unwrap_or(0)
    }
}

/// Restrict a scan to one side of the certainty threshold, so the
/// high-priority rules can be consulted before filename globs and the rest
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityFilter {
    All,
    /// Only rules with priority >= 80.
    HighOnly,
    /// Only rules with priority < 80.
    LowOnly,
}

impl PriorityFilter {
    pub fn admits(self, priority: u8) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::HighOnly => priority >= HIGH_PRIORITY_THRESHOLD,
            PriorityFilter::LowOnly => priority < HIGH_PRIORITY_THRESHOLD,
        }
    }
}

/// Result of a content scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    pub mime_type: String,
    /// Confidence on the 0..=100 scale; the winning rule's priority.
    pub accuracy: u8,
}

/// All magic rules, sorted by descending priority.
#[derive(Debug, Default, Clone)]
pub struct MagicMatcher {
    rules: Vec<MagicRule>,
    max_extent: usize,
}

impl MagicMatcher {
    pub fn new(mut rules: Vec<MagicRule>) -> Self {
        // Stable sort keeps source order inside a priority class.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        let max_extent = rules.iter().map(MagicRule::extent).max().unwrap_or(0);
        Self { rules, max_extent }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Longest input prefix any rule can inspect. Callers reading from a
    /// file need at most this many bytes.
    pub fn max_extent(&self) -> usize {
        self.max_extent
    }

    /// Scan `data` against the rules admitted by `filter`, best priority
    /// first. Zero-length input short-circuits to its dedicated type.
    pub fn match_data(&self, data: &[u8], filter: PriorityFilter) -> Option<ContentMatch> {
        if data.is_empty() {
            return Some(ContentMatch {
                mime_type: ZERO_SIZE_TYPE.to_string(),
                accuracy: 100,
            });
        }
        for rule in &self.rules {
            if filter == PriorityFilter::HighOnly && rule.priority < HIGH_PRIORITY_THRESHOLD {
                break;
            }
            if filter.admits(rule.priority) && rule.matches(data) {
                return Some(ContentMatch {
                    mime_type: rule.mime_type.clone(),
                    accuracy: rule.priority,
                });
            }
        }
        None
    }

    /// Full scan with the text-or-binary heuristic as last resort. Always
    /// produces an answer.
    pub fn match_data_with_fallback(&self, data: &[u8]) -> ContentMatch {
        if let Some(hit) = self.match_data(data, PriorityFilter::All) {
            return hit;
        }
        if is_binary_data(data) {
            ContentMatch {
                mime_type: DEFAULT_TYPE.to_string(),
                accuracy: 0,
            }
        } else {
            ContentMatch {
                mime_type: PLAIN_TEXT_TYPE.to_string(),
                accuracy: 5,
            }
        }
    }
}

/// Heuristic used when no rule fires: any control byte other than tab,
/// newline or carriage return in the first 32 bytes marks the input as
/// binary.
pub fn is_binary_data(data: &[u8]) -> bool {
    data.iter()
        .take(32)
        .any(|&b| b < 32 && b != b'\t' && b != b'\n' && b != b'\r')
}
