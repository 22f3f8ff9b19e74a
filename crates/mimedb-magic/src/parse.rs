//! Parser for the binary-ish `magic` database format.
//!
//! The file starts with a `MIME-Magic\0\n` header, followed by sections of
//! the form `[priority:mime/type]\n` and matchlet lines:
//!
//! ```text
//! [indent]>start=<len:u16be><value>[&<mask>][~<word-size>][+<range-length>]\n
//! ```
//!
//! Values are length-prefixed and may themselves contain newlines, so the
//! parser works on raw bytes with a cursor, not on lines. Multi-byte words
//! are stored big-endian and swapped on little-endian hosts at parse time.

use crate::error::{MagicError, Result};
use crate::rule::{MagicRule, Matchlet};

/// Leading bytes of every magic database file.
pub const MAGIC_HEADER: &[u8] = b"MIME-Magic\0\n";

/// Parse a whole magic file. Individual malformed sections are skipped;
/// only a missing header fails the file.
pub fn parse_magic_bytes(data: &[u8]) -> Result<Vec<MagicRule>> {
    if !data.starts_with(MAGIC_HEADER) {
        return Err(MagicError::BadHeader);
    }
    let mut pos = MAGIC_HEADER.len();
    let mut rules = Vec::new();

    while pos < data.len() {
        if data[pos] != b'[' {
            pos = skip_to_next_section(data, pos);
            continue;
        }
        let Some((priority, mime_type, after_header)) = parse_section_header(data, pos) else {
            pos = skip_to_next_section(data, pos + 1);
            continue;
        };
        pos = after_header;

        let mut roots: Vec<Matchlet> = Vec::new();
        while pos < data.len() && data[pos] != b'[' {
            match parse_matchlet_line(data, pos) {
                Some((depth, matchlet, next)) => {
                    pos = next;
                    if let Some(matchlet) = matchlet {
                        insert_at_depth(&mut roots, depth, matchlet);
                    }
                }
                None => {
                    pos = skip_to_next_section(data, pos + 1);
                    break;
                }
            }
        }
        if !roots.is_empty() {
            rules.push(MagicRule {
                mime_type,
                priority,
                matchlets: roots,
            });
        }
    }
    Ok(rules)
}

/// Resync after a malformed line: jump to the next `\n[`.
fn skip_to_next_section(data: &[u8], from: usize) -> usize {
    let mut pos = from;
    while pos < data.len() {
        if data[pos] == b'\n' && data.get(pos + 1) == Some(&b'[') {
            return pos + 1;
        }
        pos += 1;
    }
    data.len()
}

/// Parse `[priority:mime/type]\n` starting at `pos` (which points at `[`).
fn parse_section_header(data: &[u8], pos: usize) -> Option<(u8, String, usize)> {
    let line_end = find_byte(data, pos, b'\n')?;
    let inner = data.get(pos + 1..line_end)?;
    let inner = inner.strip_suffix(b"]")?;
    let text = std::str::from_utf8(inner).ok()?;
    let (priority, mime_type) = text.split_once(':')?;
    let priority: u8 = priority.trim().parse().ok()?;
    if priority > 100 || !mime_type.contains('/') {
        return None;
    }
    Some((priority, mime_type.to_string(), line_end + 1))
}

/// Parse one matchlet line. Returns the indent depth, the matchlet (or
/// `None` when the line is well-formed but the matchlet itself is invalid,
/// such as a value length not divisible by the word size), and the cursor
/// position after the terminating newline.
fn parse_matchlet_line(data: &[u8], mut pos: usize) -> Option<(usize, Option<Matchlet>, usize)> {
    let depth = parse_digits(data, &mut pos).unwrap_or(0);
    if data.get(pos) != Some(&b'>') {
        return None;
    }
    pos += 1;
    let range_start = parse_digits(data, &mut pos)?;
    if data.get(pos) != Some(&b'=') {
        return None;
    }
    pos += 1;

    let len_bytes = data.get(pos..pos + 2)?;
    let value_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    pos += 2;
    let mut value = data.get(pos..pos + value_len)?.to_vec();
    pos += value_len;

    let mut mask = None;
    if data.get(pos) == Some(&b'&') {
        pos += 1;
        mask = Some(data.get(pos..pos + value_len)?.to_vec());
        pos += value_len;
    }

    let mut word_size = 1;
    if data.get(pos) == Some(&b'~') {
        pos += 1;
        word_size = parse_digits(data, &mut pos)?;
    }

    let mut range_length = 1;
    if data.get(pos) == Some(&b'+') {
        pos += 1;
        range_length = parse_digits(data, &mut pos)?;
    }

    if data.get(pos) != Some(&b'\n') {
        return None;
    }
    pos += 1;

    if value.is_empty() || range_length == 0 {
        return Some((depth, None, pos));
    }
    match word_size {
        1 => {}
        2 | 4 => {
            if value_len % word_size != 0 {
                return Some((depth, None, pos));
            }
            if cfg!(target_endian = "little") {
                swap_words(&mut value, word_size);
                if let Some(mask) = mask.as_mut() {
                    swap_words(mask, word_size);
                }
            }
        }
        _ => return Some((depth, None, pos)),
    }

    Some((
        depth,
        Some(Matchlet {
            range_start,
            range_length,
            value,
            mask,
            children: Vec::new(),
        }),
        pos,
    ))
}

/// Attach `matchlet` as a child of the last node at `depth - 1`, walking
/// the last-child chain from the roots. Orphans (no parent at that depth)
/// are dropped.
fn insert_at_depth(roots: &mut Vec<Matchlet>, depth: usize, matchlet: Matchlet) {
    if depth == 0 {
        roots.push(matchlet);
        return;
    }
    let mut parent = match roots.last_mut() {
        Some(parent) => parent,
        None => return,
    };
    for _ in 1..depth {
        parent = match parent.children.last_mut() {
            Some(child) => child,
            None => return,
        };
    }
    parent.children.push(matchlet);
}

fn parse_digits(data: &[u8], pos: &mut usize) -> Option<usize> {
    let start = *pos;
    while data.get(*pos).is_some_and(u8::is_ascii_digit) {
        *pos += 1;
    }
    if *pos == start {
        return None;
    }
    std::str::from_utf8(&data[start..*pos]).ok()?.parse().ok()
}

/// In-place big-endian to host byte swap over `word_size` chunks.
fn swap_words(bytes: &mut [u8], word_size: usize) {
    for chunk in bytes.chunks_exact_mut(word_size) {
        chunk.reverse();
    }
}

fn find_byte(data: &[u8], from: usize, needle: u8) -> Option<usize> {
    data[from..].iter().position(|&b| b == needle).map(|i| from + i)
}
