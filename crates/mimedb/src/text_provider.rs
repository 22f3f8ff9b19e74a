//! Loading the text resource files.
//!
//! Everything here reads the plain-text database sources under each mime
//! directory: `globs2`/`globs`, `magic`, `aliases`, `subclasses`, `types`.
//! Malformed lines are skipped with a log entry, missing files are simply
//! absent; loading never fails.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use mimedb_glob::{parse_glob_lines, GlobIndex, GlobIndexBuilder};
use mimedb_magic::{parse_magic_bytes, MagicMatcher};

/// Glob rules compiled for matching, plus the per-type pattern lists used
/// to build [`MimeType`](crate::MimeType) snapshots.
pub struct GlobTable {
    pub index: GlobIndex,
    pub patterns_by_mime: HashMap<String, Vec<String>>,
}

/// Parse `globs2` (preferred) or `globs` from every directory.
///
/// Directories are consumed most global first, so a local `__NOGLOBS__`
/// marker erases rules accumulated from the system files.
pub fn load_glob_table(mime_dirs: &[PathBuf]) -> GlobTable {
    let mut builder = GlobIndexBuilder::new();
    for dir in mime_dirs.iter().rev() {
        let Some((path, content)) = read_first(dir, &["globs2", "globs"]) else {
            continue;
        };
        let skipped = parse_glob_lines(&mut builder, &content);
        if skipped > 0 {
            warn!(path = %path.display(), skipped, "skipped malformed glob lines");
        }
    }

    let mut patterns_by_mime: HashMap<String, Vec<String>> = HashMap::new();
    for rule in builder.rules() {
        let patterns = patterns_by_mime.entry(rule.mime_type.clone()).or_default();
        if !patterns.contains(&rule.pattern) {
            patterns.push(rule.pattern.clone());
        }
    }

    let index = match builder.build() {
        Ok(index) => index,
        Err(err) => {
            warn!(%err, "failed to compile glob rules");
            GlobIndex::default()
        }
    };
    GlobTable {
        index,
        patterns_by_mime,
    }
}

/// Parse `magic` from every directory, most local first so ties in
/// priority favor the more local rule.
pub fn load_magic(mime_dirs: &[PathBuf]) -> MagicMatcher {
    let mut rules = Vec::new();
    for dir in mime_dirs {
        let path = dir.join("magic");
        match fs::read(&path) {
            Ok(bytes) => match parse_magic_bytes(&bytes) {
                Ok(mut parsed) => {
                    debug!(path = %path.display(), rules = parsed.len(), "loaded magic rules");
                    rules.append(&mut parsed);
                }
                Err(err) => warn!(path = %path.display(), %err, "ignoring magic file"),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), %err, "cannot read magic file"),
        }
    }
    MagicMatcher::new(rules)
}

/// Parse `aliases`: `alias canonical` per line. More local files win.
pub fn load_aliases(mime_dirs: &[PathBuf]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for dir in mime_dirs.iter().rev() {
        for (alias, canonical) in pair_lines(&dir.join("aliases")) {
            map.insert(alias, canonical);
        }
    }
    map
}

/// Parse `subclasses`: `child parent` per line, merged across files with
/// the more local declarations first.
pub fn load_parents(mime_dirs: &[PathBuf]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for dir in mime_dirs {
        for (child, parent) in pair_lines(&dir.join("subclasses")) {
            let parents = map.entry(child).or_default();
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }
    map
}

/// Names of all declared types, from the `types` files.
///
/// When no `types` file exists at all the registry degrades to every name
/// referenced by the other tables, so declared-type checks stay useful.
pub fn load_registry(
    mime_dirs: &[PathBuf],
    globs: &GlobTable,
    parents: &HashMap<String, Vec<String>>,
    aliases: &HashMap<String, String>,
) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut found_any = false;
    for dir in mime_dirs {
        let path = dir.join("types");
        match fs::read_to_string(&path) {
            Ok(content) => {
                found_any = true;
                for line in content.lines() {
                    let line = line.trim();
                    if !line.is_empty() && !line.starts_with('#') {
                        names.insert(line.to_string());
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), %err, "cannot read types file"),
        }
    }
    if found_any {
        return names;
    }
    debug!("no types files, deriving the registry from other tables");
    names.extend(globs.patterns_by_mime.keys().cloned());
    for (child, list) in parents {
        names.insert(child.clone());
        names.extend(list.iter().cloned());
    }
    names.extend(aliases.values().cloned());
    names
}

fn read_first(dir: &Path, candidates: &[&str]) -> Option<(PathBuf, String)> {
    for name in candidates {
        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => return Some((path, content)),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), %err, "cannot read glob file"),
        }
    }
    None
}

/// Whitespace-separated pairs, `#` comments, bad lines skipped.
fn pair_lines(path: &Path) -> Vec<(String, String)> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), %err, "cannot read resource file");
            }
            return Vec::new();
        }
    };
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(a), Some(b)) => pairs.push((a.to_string(), b.to_string())),
            _ => warn!(path = %path.display(), line, "skipping malformed line"),
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn globs2_preferred_over_globs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("globs"), "text/old:*.x\n").unwrap();
        fs::write(dir.path().join("globs2"), "50:text/new:*.x\n").unwrap();
        let table = load_glob_table(&[dir.path().to_path_buf()]);
        assert_eq!(table.index.match_file_name("a.x").mime_types, ["text/new"]);
    }

    #[test]
    fn local_noglobs_overrides_global() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(system.path().join("globs2"), "50:text/plain:*.txt\n").unwrap();
        fs::write(local.path().join("globs2"), "50:text/plain:__NOGLOBS__\n50:text/plain:*.md\n").unwrap();
        let dirs = vec![local.path().to_path_buf(), system.path().to_path_buf()];
        let table = load_glob_table(&dirs);
        assert!(table.index.match_file_name("a.txt").mime_types.is_empty());
        assert_eq!(table.index.match_file_name("a.md").mime_types, ["text/plain"]);
    }

    #[test]
    fn pattern_lists_follow_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("globs2"),
            "50:text/x-c:*.c\n50:text/x-c:[Mm]akefile.cpp\n",
        )
        .unwrap();
        let table = load_glob_table(&[dir.path().to_path_buf()]);
        assert_eq!(
            table.patterns_by_mime["text/x-c"],
            ["*.c", "[Mm]akefile.cpp"]
        );
    }

    #[test]
    fn aliases_local_wins() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(system.path().join("aliases"), "text/x-md text/plain\n").unwrap();
        fs::write(local.path().join("aliases"), "text/x-md text/markdown\n").unwrap();
        let dirs = vec![local.path().to_path_buf(), system.path().to_path_buf()];
        let map = load_aliases(&dirs);
        assert_eq!(map["text/x-md"], "text/markdown");
    }

    #[test]
    fn subclasses_merge_and_dedupe() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(system.path().join("subclasses"), "a/b c/d\na/b e/f\n").unwrap();
        fs::write(local.path().join("subclasses"), "a/b c/d\n# comment\n").unwrap();
        let dirs = vec![local.path().to_path_buf(), system.path().to_path_buf()];
        let map = load_parents(&dirs);
        assert_eq!(map["a/b"], ["c/d", "e/f"]);
    }

    #[test]
    fn registry_from_types_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("types"), "text/plain\nimage/png\n").unwrap();
        let dirs = vec![dir.path().to_path_buf()];
        let globs = load_glob_table(&dirs);
        let registry = load_registry(&dirs, &globs, &HashMap::new(), &HashMap::new());
        assert!(registry.contains("text/plain"));
        assert!(registry.contains("image/png"));
        assert!(!registry.contains("text/html"));
    }

    #[test]
    fn registry_degrades_to_referenced_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("globs2"), "50:text/x-log:*.log\n").unwrap();
        let dirs = vec![dir.path().to_path_buf()];
        let globs = load_glob_table(&dirs);
        let mut parents = HashMap::new();
        parents.insert("a/b".to_string(), vec!["c/d".to_string()]);
        let registry = load_registry(&dirs, &globs, &parents, &HashMap::new());
        assert!(registry.contains("text/x-log"));
        assert!(registry.contains("a/b"));
        assert!(registry.contains("c/d"));
    }
}
