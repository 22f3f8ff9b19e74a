//! Query layer over a set of cache files.

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use mimedb_glob::{CaseSensitivity, GlobMatchResult, GlobPattern};
use mimedb_magic::{match_window, ContentMatch, PriorityFilter, HIGH_PRIORITY_THRESHOLD};

use crate::error::{CacheError, Result};
use crate::view::{
    CacheFile, POS_ALIAS_LIST, POS_GENERIC_ICONS_LIST, POS_GLOB_LIST, POS_ICONS_LIST,
    POS_LITERAL_LIST, POS_MAGIC_LIST, POS_PARENT_LIST, POS_SUFFIX_TREE,
};
use crate::CACHE_FILE_NAME;

const CASE_SENSITIVE_FLAG: u32 = 0x100;
const WEIGHT_MASK: u32 = 0xff;

// Real rule sets nest matchlets a handful of levels deep; only a corrupt
// child offset (a cycle, in particular) can get anywhere near this.
const MAX_MATCHLET_DEPTH: usize = 32;

/// All usable cache files, most local first.
///
/// Lookup results merge across files the same way the text sources merge:
/// glob matches accumulate into one [`GlobMatchResult`], magic takes the
/// first hit in file order, alias and icon lookups take the first file
/// that knows the name.
pub struct CacheProvider {
    files: Vec<CacheFile>,
}

impl CacheProvider {
    /// Open `mime.cache` under each of `mime_dirs` (most local first) and
    /// decide whether the set is usable.
    ///
    /// A lone cache in the first (user-writable) directory is not trusted:
    /// it shadows the system database without covering it, which means the
    /// update tool has not run since the system files changed. In that
    /// case, and when no cache exists at all, `None` is returned and the
    /// caller parses the text sources instead.
    pub fn open(mime_dirs: &[PathBuf]) -> Option<Self> {
        let mut files = Vec::new();
        let mut lone_local = false;
        for (dir_index, dir) in mime_dirs.iter().enumerate() {
            let path = dir.join(CACHE_FILE_NAME);
            match CacheFile::open(&path) {
                Ok(file) => {
                    debug!(path = %path.display(), "opened binary cache");
                    lone_local = files.is_empty() && dir_index == 0;
                    files.push(file);
                }
                Err(CacheError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), %err, "ignoring unusable cache");
                }
            }
        }
        match files.len() {
            0 => None,
            1 if lone_local => {
                debug!("only the local cache exists, falling back to text sources");
                None
            }
            _ => Some(Self { files }),
        }
    }

    /// Build a provider directly from already-opened files.
    pub fn from_files(files: Vec<CacheFile>) -> Self {
        Self { files }
    }

    pub fn file_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(CacheFile::path)
    }

    /// Glob lookup across the literal list, glob list and reverse suffix
    /// tree of every file.
    pub fn match_file_name(&self, file_name: &str) -> Result<GlobMatchResult> {
        let mut result = GlobMatchResult::default();
        if file_name.is_empty() {
            return Ok(result);
        }
        let chars: Vec<char> = file_name.chars().collect();
        let lower_chars: Vec<char> = file_name.to_lowercase().chars().collect();

        for file in &self.files {
            self.match_glob_list(file, &mut result, file.section(POS_LITERAL_LIST)?, file_name)?;
            self.match_glob_list(file, &mut result, file.section(POS_GLOB_LIST)?, file_name)?;

            let tree_off = file.section(POS_SUFFIX_TREE)?;
            let num_roots = file.get_u32(tree_off)? as usize;
            let first_root = file.get_u32(tree_off + 4)? as usize;
            // First pass lowercased, taking only case-insensitive entries;
            // the second pass with the original name takes everything and
            // runs only when the first walk itself found nothing, whatever
            // the glob lists contributed.
            let tree_matched = match_suffix_tree(
                file,
                &mut result,
                num_roots,
                first_root,
                &lower_chars,
                lower_chars.len() - 1,
                false,
            )?;
            if !tree_matched {
                match_suffix_tree(
                    file,
                    &mut result,
                    num_roots,
                    first_root,
                    &chars,
                    chars.len() - 1,
                    true,
                )?;
            }
        }
        Ok(result)
    }

    fn match_glob_list(
        &self,
        file: &CacheFile,
        result: &mut GlobMatchResult,
        list_off: usize,
        file_name: &str,
    ) -> Result<()> {
        let num_globs = file.get_u32(list_off)? as usize;
        for i in 0..num_globs {
            let off = list_off + 4 + 12 * i;
            let pattern_off = file.get_u32(off)? as usize;
            let mime_off = file.get_u32(off + 4)? as usize;
            let flags_and_weight = file.get_u32(off + 8)?;
            let weight = (flags_and_weight & WEIGHT_MASK) as u8;
            let case = if flags_and_weight & CASE_SENSITIVE_FLAG != 0 {
                CaseSensitivity::Sensitive
            } else {
                CaseSensitivity::Insensitive
            };
            let pattern_text = file.get_cstr(pattern_off)?;
            let pattern = match GlobPattern::new(pattern_text, case) {
                Ok(pattern) => pattern,
                Err(err) => {
                    trace!(pattern = pattern_text, %err, "skipping bad cache glob");
                    continue;
                }
            };
            if pattern.matches(file_name) {
                result.add_match(file.get_cstr(mime_off)?, weight, pattern_text);
            }
        }
        Ok(())
    }

    /// Content sniffing over the magic sections, admitted rules in
    /// priority order, first hit wins.
    pub fn match_data(&self, data: &[u8], filter: PriorityFilter) -> Result<Option<ContentMatch>> {
        if data.is_empty() {
            return Ok(None);
        }
        for file in &self.files {
            let magic_off = file.section(POS_MAGIC_LIST)?;
            let num_rules = file.get_u32(magic_off)? as usize;
            let first_rule = file.get_u32(magic_off + 8)? as usize;
            for i in 0..num_rules {
                let off = first_rule + i * 16;
                let priority = file.get_u32(off)?.min(100) as u8;
                // Rules are sorted by descending priority within a file.
                if filter == PriorityFilter::HighOnly && priority < HIGH_PRIORITY_THRESHOLD {
                    break;
                }
                if !filter.admits(priority) {
                    continue;
                }
                let num_matchlets = file.get_u32(off + 8)? as usize;
                let first_matchlet = file.get_u32(off + 12)? as usize;
                if match_matchlets(file, num_matchlets, first_matchlet, data, 0)? {
                    let mime_off = file.get_u32(off + 4)? as usize;
                    return Ok(Some(ContentMatch {
                        mime_type: file.get_cstr(mime_off)?.to_string(),
                        accuracy: priority,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Longest input prefix any magic rule can inspect, as recorded in the
    /// files' headers.
    pub fn max_extent(&self) -> Result<usize> {
        let mut max = 0;
        for file in &self.files {
            let magic_off = file.section(POS_MAGIC_LIST)?;
            max = max.max(file.get_u32(magic_off + 4)? as usize);
        }
        Ok(max)
    }

    /// Resolve an alias to its canonical name, or `None` when `name` is
    /// not an alias.
    pub fn resolve_alias(&self, name: &str) -> Result<Option<String>> {
        for file in &self.files {
            let list_off = file.section(POS_ALIAS_LIST)?;
            if let Some(mime_off) = lookup_sorted(file, list_off, name)? {
                return Ok(Some(file.get_cstr(mime_off as usize)?.to_string()));
            }
        }
        Ok(None)
    }

    /// Explicitly declared parents of `mime_type`, merged across files.
    pub fn parents(&self, mime_type: &str) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for file in &self.files {
            let list_off = file.section(POS_PARENT_LIST)?;
            if let Some(parents_off) = lookup_sorted(file, list_off, mime_type)? {
                let parents_off = parents_off as usize;
                let num_parents = file.get_u32(parents_off)? as usize;
                for i in 0..num_parents {
                    let parent_off = file.get_u32(parents_off + 4 + 4 * i)? as usize;
                    let parent = file.get_cstr(parent_off)?;
                    if !result.iter().any(|p| p == parent) {
                        result.push(parent.to_string());
                    }
                }
            }
        }
        Ok(result)
    }

    pub fn icon_name(&self, mime_type: &str) -> Result<Option<String>> {
        self.icon_lookup(POS_ICONS_LIST, mime_type)
    }

    pub fn generic_icon_name(&self, mime_type: &str) -> Result<Option<String>> {
        self.icon_lookup(POS_GENERIC_ICONS_LIST, mime_type)
    }

    fn icon_lookup(&self, pos: usize, mime_type: &str) -> Result<Option<String>> {
        for file in &self.files {
            let list_off = file.section(pos)?;
            if let Some(icon_off) = lookup_sorted(file, list_off, mime_type)? {
                return Ok(Some(file.get_cstr(icon_off as usize)?.to_string()));
            }
        }
        Ok(None)
    }
}

/// Binary search in a sorted table of `(name offset, value)` pairs.
fn lookup_sorted(file: &CacheFile, list_off: usize, key: &str) -> Result<Option<u32>> {
    let num_entries = file.get_u32(list_off)? as i64;
    let mut lo = 0i64;
    let mut hi = num_entries - 1;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let off = list_off + 4 + 8 * mid as usize;
        let name = file.get_cstr(file.get_u32(off)? as usize)?;
        match name.as_bytes().cmp(key.as_bytes()) {
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid - 1,
            std::cmp::Ordering::Equal => return Ok(Some(file.get_u32(off + 4)?)),
        }
    }
    Ok(None)
}

/// Walk the reverse suffix tree from the filename's last character.
///
/// Internal nodes carry a character; leaves have character zero and sort
/// first among their siblings, so the leaf scan stops at the first
/// non-zero child. The recursion mirrors the reference reader, including
/// its quirk of never descending through the filename's first character.
fn match_suffix_tree(
    file: &CacheFile,
    result: &mut GlobMatchResult,
    num_entries: usize,
    first_offset: usize,
    chars: &[char],
    char_pos: usize,
    case_sensitive_check: bool,
) -> Result<bool> {
    let file_char = match chars.get(char_pos) {
        Some(&c) => c as u32,
        None => return Ok(false),
    };
    let mut lo = 0i64;
    let mut hi = num_entries as i64 - 1;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let off = first_offset + 12 * mid as usize;
        let ch = file.get_u32(off)?;
        if ch < file_char {
            lo = mid + 1;
        } else if ch > file_char {
            hi = mid - 1;
        } else {
            let num_children = file.get_u32(off + 4)? as usize;
            let children_offset = file.get_u32(off + 8)? as usize;
            let mut success = false;
            if char_pos > 1 {
                success = match_suffix_tree(
                    file,
                    result,
                    num_children,
                    children_offset,
                    chars,
                    char_pos - 1,
                    case_sensitive_check,
                )?;
            }
            if !success {
                let suffix: String = chars[char_pos..].iter().collect();
                let pattern = format!("*{suffix}");
                for i in 0..num_children {
                    let child_off = children_offset + 12 * i;
                    if file.get_u32(child_off)? != 0 {
                        break;
                    }
                    let mime_off = file.get_u32(child_off + 4)? as usize;
                    let flags_and_weight = file.get_u32(child_off + 8)?;
                    let weight = (flags_and_weight & WEIGHT_MASK) as u8;
                    let case_sensitive = flags_and_weight & CASE_SENSITIVE_FLAG != 0;
                    if case_sensitive_check || !case_sensitive {
                        result.add_match(file.get_cstr(mime_off)?, weight, &pattern);
                        success = true;
                    }
                }
            }
            return Ok(success);
        }
    }
    Ok(false)
}

fn match_matchlets(
    file: &CacheFile,
    num_matchlets: usize,
    first_offset: usize,
    data: &[u8],
    depth: usize,
) -> Result<bool> {
    if depth > MAX_MATCHLET_DEPTH {
        return Err(CacheError::NestingTooDeep {
            offset: first_offset,
        });
    }
    for i in 0..num_matchlets {
        let off = first_offset + i * 32;
        let range_start = file.get_u32(off)? as usize;
        let range_length = file.get_u32(off + 4)? as usize;
        // Word size at +8 is ignored; cache values are stored pre-swapped.
        let value_length = file.get_u32(off + 12)? as usize;
        let value_offset = file.get_u32(off + 16)? as usize;
        let mask_offset = file.get_u32(off + 20)? as usize;
        let value = file.get_slice(value_offset, value_length)?;
        let mask = if mask_offset != 0 {
            Some(file.get_slice(mask_offset, value_length)?)
        } else {
            None
        };
        if !match_window(data, range_start, range_length, value, mask) {
            continue;
        }
        let num_children = file.get_u32(off + 24)? as usize;
        let first_child = file.get_u32(off + 28)? as usize;
        if num_children == 0 {
            return Ok(true);
        }
        if match_matchlets(file, num_children, first_child, data, depth + 1)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::HEADER_SIZE;
    use std::fs;

    fn minimal_cache() -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&1u16.to_be_bytes());
        buf[2..4].copy_from_slice(&2u16.to_be_bytes());
        buf
    }

    #[test]
    fn lone_local_cache_is_not_trusted() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(local.path().join(CACHE_FILE_NAME), minimal_cache()).unwrap();
        let dirs = vec![local.path().to_path_buf(), system.path().to_path_buf()];
        assert!(CacheProvider::open(&dirs).is_none());
    }

    #[test]
    fn lone_system_cache_is_trusted() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(system.path().join(CACHE_FILE_NAME), minimal_cache()).unwrap();
        let dirs = vec![local.path().to_path_buf(), system.path().to_path_buf()];
        assert!(CacheProvider::open(&dirs).is_some());
    }

    #[test]
    fn two_caches_are_trusted() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(local.path().join(CACHE_FILE_NAME), minimal_cache()).unwrap();
        fs::write(system.path().join(CACHE_FILE_NAME), minimal_cache()).unwrap();
        let dirs = vec![local.path().to_path_buf(), system.path().to_path_buf()];
        let provider = CacheProvider::open(&dirs).unwrap();
        assert_eq!(provider.file_paths().count(), 2);
    }

    #[test]
    fn invalid_cache_is_skipped() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(local.path().join(CACHE_FILE_NAME), b"not a cache").unwrap();
        fs::write(system.path().join(CACHE_FILE_NAME), minimal_cache()).unwrap();
        let dirs = vec![local.path().to_path_buf(), system.path().to_path_buf()];
        let provider = CacheProvider::open(&dirs).unwrap();
        assert_eq!(provider.file_paths().count(), 1);
    }

    #[test]
    fn no_caches_at_all() {
        let empty = tempfile::tempdir().unwrap();
        assert!(CacheProvider::open(&[empty.path().to_path_buf()]).is_none());
    }
}
