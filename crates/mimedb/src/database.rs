//! The resolution orchestrator.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use mimedb_cache::CacheProvider;
use mimedb_glob::GlobMatchResult;
use mimedb_magic::{
    is_binary_data, ContentMatch, MagicMatcher, PriorityFilter, DEFAULT_TYPE,
    HIGH_PRIORITY_THRESHOLD, PLAIN_TEXT_TYPE, ZERO_SIZE_TYPE,
};

use crate::error::MimeDbError;
use crate::mime_type::MimeType;
use crate::text_provider::{self, GlobTable};
use crate::{paths, DIRECTORY_TYPE, EXECUTABLE_TYPE};

/// One lazily-built memoized table. First caller builds under the write
/// lock; later callers only take the read lock.
struct LazyCell<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> Default for LazyCell<T> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }
}

impl<T> LazyCell<T> {
    fn get_or_init(&self, init: impl FnOnce() -> T) -> Arc<T> {
        if let Some(value) = self.slot.read().as_ref() {
            return value.clone();
        }
        let mut slot = self.slot.write();
        if let Some(value) = slot.as_ref() {
            return value.clone();
        }
        let value = Arc::new(init());
        *slot = Some(value.clone());
        value
    }

    fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

/// What the file-mode bits say about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Directory,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    /// A regular file with any execute bit set.
    RegularExecutable,
}

impl InodeKind {
    /// The fixed mimetype for special inode kinds. Executables are not an
    /// inode type; they get special handling only for untrusted names.
    fn mime_type(self) -> Option<&'static str> {
        match self {
            InodeKind::Directory => Some(DIRECTORY_TYPE),
            InodeKind::CharDevice => Some("inode/chardevice"),
            InodeKind::BlockDevice => Some("inode/blockdevice"),
            InodeKind::Fifo => Some("inode/fifo"),
            InodeKind::Socket => Some("inode/socket"),
            InodeKind::RegularExecutable => None,
        }
    }
}

/// A resolved mimetype with its confidence on the 0..=100 scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub mime_type: String,
    pub accuracy: u8,
}

impl Match {
    fn new(mime_type: impl Into<String>, accuracy: u8) -> Self {
        Self {
            mime_type: mime_type.into(),
            accuracy,
        }
    }
}

impl From<ContentMatch> for Match {
    fn from(hit: ContentMatch) -> Self {
        Self {
            mime_type: hit.mime_type,
            accuracy: hit.accuracy,
        }
    }
}

/// Everything [`MimeDb::resolve`] may consider about one source.
#[derive(Debug, Clone)]
pub struct ResolveInput<'a> {
    file_name: Option<&'a str>,
    inode: Option<InodeKind>,
    content: Option<&'a [u8]>,
    trust_name: bool,
    fast_mode: bool,
    default_type: Option<&'a str>,
}

impl Default for ResolveInput<'_> {
    fn default() -> Self {
        Self {
            file_name: None,
            inode: None,
            content: None,
            trust_name: true,
            fast_mode: false,
            default_type: None,
        }
    }
}

impl<'a> ResolveInput<'a> {
    pub fn file_name(mut self, name: &'a str) -> Self {
        self.file_name = Some(name);
        self
    }

    pub fn inode(mut self, kind: InodeKind) -> Self {
        self.inode = Some(kind);
        self
    }

    pub fn content(mut self, bytes: &'a [u8]) -> Self {
        self.content = Some(bytes);
        self
    }

    /// Mark the name untrusted (remote sources). Globs are skipped and an
    /// executable mode bit resolves straight to the executable type.
    pub fn untrusted_name(mut self) -> Self {
        self.trust_name = false;
        self
    }

    /// Name-only resolution that will never open content; a unique glob
    /// match reports accuracy 80 instead of 100.
    pub fn fast_mode(mut self) -> Self {
        self.fast_mode = true;
        self
    }

    /// Per-source default type, returned at accuracy 10 when nothing else
    /// applies (e.g. a protocol that serves HTML by convention).
    pub fn default_type(mut self, mime_type: &'a str) -> Self {
        self.default_type = Some(mime_type);
        self
    }
}

/// The mimetype database.
///
/// Construction is I/O-free; tables are built on first use and memoized.
/// All lookup methods take `&self` and are safe to call concurrently.
pub struct MimeDb {
    mime_dirs: Vec<PathBuf>,
    cache: LazyCell<Option<CacheProvider>>,
    globs: LazyCell<GlobTable>,
    magic: LazyCell<MagicMatcher>,
    aliases: LazyCell<HashMap<String, String>>,
    parent_map: LazyCell<HashMap<String, Vec<String>>>,
    registry: LazyCell<HashSet<String>>,
    warned_empty: AtomicBool,
}

impl Default for MimeDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeDb {
    /// Database over the standard XDG search directories.
    pub fn new() -> Self {
        Self::with_search_dirs(paths::default_mime_dirs())
    }

    /// Database over explicit mime directories, most local first.
    pub fn with_search_dirs(mime_dirs: Vec<PathBuf>) -> Self {
        Self {
            mime_dirs,
            cache: LazyCell::default(),
            globs: LazyCell::default(),
            magic: LazyCell::default(),
            aliases: LazyCell::default(),
            parent_map: LazyCell::default(),
            registry: LazyCell::default(),
            warned_empty: AtomicBool::new(false),
        }
    }

    /// Drop all memoized tables; the next lookup reparses from disk.
    pub fn invalidate(&self) {
        self.cache.invalidate();
        self.globs.invalidate();
        self.magic.invalidate();
        self.aliases.invalidate();
        self.parent_map.invalidate();
        self.registry.invalidate();
    }

    fn cache(&self) -> Arc<Option<CacheProvider>> {
        self.cache
            .get_or_init(|| CacheProvider::open(&self.mime_dirs))
    }

    fn globs(&self) -> Arc<GlobTable> {
        self.globs
            .get_or_init(|| text_provider::load_glob_table(&self.mime_dirs))
    }

    fn magic(&self) -> Arc<MagicMatcher> {
        self.magic
            .get_or_init(|| text_provider::load_magic(&self.mime_dirs))
    }

    fn aliases(&self) -> Arc<HashMap<String, String>> {
        self.aliases
            .get_or_init(|| text_provider::load_aliases(&self.mime_dirs))
    }

    fn parent_map(&self) -> Arc<HashMap<String, Vec<String>>> {
        self.parent_map
            .get_or_init(|| text_provider::load_parents(&self.mime_dirs))
    }

    fn registry(&self) -> Arc<HashSet<String>> {
        self.registry.get_or_init(|| {
            text_provider::load_registry(
                &self.mime_dirs,
                &self.globs(),
                &self.parent_map(),
                &self.aliases(),
            )
        })
    }

    /// Snapshot of a declared type, alias-resolved. `None` for names the
    /// database does not know.
    pub fn mime_type(&self, name: &str) -> Option<MimeType> {
        let canonical = self.resolve_alias(name);
        if !self.is_declared(&canonical) {
            return None;
        }
        let patterns = self
            .globs()
            .patterns_by_mime
            .get(&canonical)
            .cloned()
            .unwrap_or_default();
        let mut icon = None;
        let mut generic_icon = None;
        if let Some(cache) = self.cache().as_ref() {
            icon = cache.icon_name(&canonical).ok().flatten();
            generic_icon = cache.generic_icon_name(&canonical).ok().flatten();
        }
        Some(MimeType::new(canonical, patterns, icon, generic_icon))
    }

    /// All glob candidates for a filename, best matches only.
    pub fn match_file_name(&self, file_name: &str) -> Vec<String> {
        self.glob_result(file_name).mime_types
    }

    /// The extension matched by the winning `*.ext` glob, if any.
    pub fn extract_known_extension(&self, file_name: &str) -> Option<String> {
        self.glob_result(file_name).found_suffix
    }

    /// Content-only lookup: magic rules, then the text-or-binary
    /// heuristic. Always answers.
    pub fn match_content(&self, data: &[u8]) -> Match {
        if data.is_empty() {
            return Match::new(ZERO_SIZE_TYPE, 100);
        }
        if let Some(hit) = self.content_match(data, PriorityFilter::All) {
            return hit.into();
        }
        if is_binary_data(data) {
            Match::new(DEFAULT_TYPE, 0)
        } else {
            Match::new(PLAIN_TEXT_TYPE, 5)
        }
    }

    /// Combined resolution over name, mode bits and content.
    ///
    /// First applicable step wins: special inode kinds, the untrusted
    /// executable shortcut, empty content, a unique trusted glob match,
    /// content sniffing (with the name-and-content agreement rule below
    /// priority 80), the deterministic glob tie-break, the per-source
    /// default, and finally the catch-all type at accuracy 0.
    pub fn resolve(&self, input: ResolveInput<'_>) -> Match {
        self.warn_once_if_empty();

        if let Some(kind) = input.inode {
            if let Some(mime) = kind.mime_type() {
                return Match::new(mime, 100);
            }
            if !input.trust_name {
                return Match::new(EXECUTABLE_TYPE, 100);
            }
        }

        if let Some(content) = input.content {
            if content.is_empty() {
                return Match::new(ZERO_SIZE_TYPE, 100);
            }
        }

        let mut candidates = Vec::new();
        if input.trust_name {
            if let Some(name) = input.file_name {
                candidates = self.declared_candidates(self.glob_result(name).mime_types);
                if candidates.len() == 1 {
                    let accuracy = if input.fast_mode { 80 } else { 100 };
                    return Match::new(candidates.remove(0), accuracy);
                }
            }
        }

        if let Some(content) = input.content {
            let hit = self.match_content(content);
            if hit.accuracy >= HIGH_PRIORITY_THRESHOLD {
                return hit;
            }
            if hit.accuracy > 0 {
                if candidates.len() >= 2 {
                    // Name and content agree when some glob candidate is
                    // the sniffed type or inherits from it. A candidate
                    // more specific than the sniffed type beats the
                    // sniffed type itself.
                    let mut agreeing = None;
                    for candidate in &candidates {
                        if self.is_subclass_of(candidate, &hit.mime_type) {
                            if candidate != &hit.mime_type {
                                agreeing = Some(candidate);
                                break;
                            }
                            agreeing.get_or_insert(candidate);
                        }
                    }
                    if let Some(candidate) = agreeing {
                        return Match::new(candidate.clone(), 100);
                    }
                }
                return hit;
            }
        }

        if candidates.len() >= 2 {
            candidates.sort();
            return Match::new(candidates.swap_remove(0), 20);
        }

        if let Some(default_type) = input.default_type {
            return Match::new(default_type, 10);
        }
        Match::new(DEFAULT_TYPE, 0)
    }

    /// Resolve a path on disk: mode bits from its metadata, name from its
    /// last component, content read up to the magic rules' extent.
    pub fn resolve_path(&self, path: &Path) -> Result<Match, MimeDbError> {
        let metadata = std::fs::metadata(path)?;
        let file_type = metadata.file_type();
        if file_type.is_dir() {
            return Ok(Match::new(DIRECTORY_TYPE, 100));
        }
        if let Some(kind) = special_inode_kind(&file_type) {
            return Ok(self.resolve(ResolveInput::default().inode(kind)));
        }

        let file_name = path.file_name().and_then(|n| n.to_str());
        let mut input = ResolveInput::default();
        if let Some(name) = file_name {
            input = input.file_name(name);
        }
        if is_executable(&metadata) {
            input = input.inode(InodeKind::RegularExecutable);
        }
        // An unreadable file just means the content signal is absent.
        let content = self.read_sniff_prefix(path);
        if let Some(content) = content.as_deref() {
            input = input.content(content);
        }
        Ok(self.resolve(input))
    }

    /// `true` when `name` is `target` or transitively inherits from it.
    /// Alias-resolved on both sides, cycle-safe.
    pub fn is_subclass_of(&self, name: &str, target: &str) -> bool {
        let target = self.resolve_alias(target);
        let start = self.resolve_alias(name);
        let mut seen = HashSet::new();
        seen.insert(start.clone());
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            // The visited set keeps cyclic parent declarations finite.
            for parent in self.parents(&current) {
                if seen.insert(parent.clone()) {
                    stack.push(parent);
                }
            }
        }
        false
    }

    /// Direct parents: the explicit declarations, or the synthesized
    /// implicit parent when there are none.
    pub fn parents(&self, name: &str) -> Vec<String> {
        let explicit = self.explicit_parents(name);
        if !explicit.is_empty() {
            return explicit;
        }
        fallback_parent(name)
            .map(|parent| vec![parent.to_string()])
            .unwrap_or_default()
    }

    /// All ancestors, breadth-first, most generic last. The canonical
    /// name leads when `name` was an alias.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let canonical = self.resolve_alias(name);
        let mut result = Vec::new();
        if canonical != name {
            result.push(canonical.clone());
        }
        let mut seen = HashSet::new();
        seen.insert(canonical.clone());
        let mut queue = VecDeque::new();
        queue.push_back(canonical);
        while let Some(current) = queue.pop_front() {
            for parent in self.parents(&current) {
                if seen.insert(parent.clone()) {
                    result.push(parent.clone());
                    queue.push_back(parent);
                }
            }
        }
        result
    }

    /// Canonical name for an alias; unknown names pass through.
    pub fn resolve_alias(&self, name: &str) -> String {
        if let Some(cache) = self.cache().as_ref() {
            match cache.resolve_alias(name) {
                Ok(Some(canonical)) => return canonical,
                Ok(None) => return name.to_string(),
                Err(err) => warn!(%err, "cache alias lookup failed, using text sources"),
            }
        }
        self.aliases()
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn icon_name(&self, name: &str) -> String {
        let canonical = self.resolve_alias(name);
        if let Some(cache) = self.cache().as_ref() {
            if let Ok(Some(icon)) = cache.icon_name(&canonical) {
                return icon;
            }
        }
        canonical.replace('/', "-")
    }

    pub fn generic_icon_name(&self, name: &str) -> String {
        let canonical = self.resolve_alias(name);
        if let Some(cache) = self.cache().as_ref() {
            if let Ok(Some(icon)) = cache.generic_icon_name(&canonical) {
                return icon;
            }
        }
        MimeType::new(canonical, Vec::new(), None, None).generic_icon_name()
    }

    fn glob_result(&self, file_name: &str) -> GlobMatchResult {
        if let Some(cache) = self.cache().as_ref() {
            match cache.match_file_name(file_name) {
                Ok(result) => return result,
                Err(err) => warn!(%err, "cache glob lookup failed, using text sources"),
            }
        }
        self.globs().index.match_file_name(file_name)
    }

    fn content_match(&self, data: &[u8], filter: PriorityFilter) -> Option<ContentMatch> {
        if let Some(cache) = self.cache().as_ref() {
            match cache.match_data(data, filter) {
                Ok(hit) => return hit,
                Err(err) => warn!(%err, "cache magic lookup failed, using text sources"),
            }
        }
        self.magic().match_data(data, filter)
    }

    fn explicit_parents(&self, name: &str) -> Vec<String> {
        if let Some(cache) = self.cache().as_ref() {
            match cache.parents(name) {
                Ok(parents) => return parents,
                Err(err) => warn!(%err, "cache parent lookup failed, using text sources"),
            }
        }
        self.parent_map().get(name).cloned().unwrap_or_default()
    }

    fn is_declared(&self, name: &str) -> bool {
        let registry = self.registry();
        registry.is_empty() || registry.contains(name)
    }

    /// Drop glob candidates naming types no declaration knows. With an
    /// empty registry (cache-only setups) nothing is filtered.
    fn declared_candidates(&self, candidates: Vec<String>) -> Vec<String> {
        let registry = self.registry();
        if registry.is_empty() {
            return candidates;
        }
        candidates
            .into_iter()
            .filter(|name| {
                if registry.contains(name) {
                    true
                } else {
                    debug!(mime_type = %name, "dropping glob candidate with no declaration");
                    false
                }
            })
            .collect()
    }

    fn read_sniff_prefix(&self, path: &Path) -> Option<Vec<u8>> {
        use std::io::Read;
        let max = self.sniff_len();
        let file = std::fs::File::open(path).ok()?;
        let mut buf = Vec::with_capacity(max);
        match file.take(max as u64).read_to_end(&mut buf) {
            Ok(_) => Some(buf),
            Err(_) => None,
        }
    }

    /// How many leading bytes content sniffing can ever use.
    fn sniff_len(&self) -> usize {
        let extent = match self.cache().as_ref() {
            Some(cache) => cache.max_extent().unwrap_or(0),
            None => self.magic().max_extent(),
        };
        extent.max(4096)
    }

    fn warn_once_if_empty(&self) {
        if self.warned_empty.load(Ordering::Relaxed) {
            return;
        }
        let empty = self.cache().is_none()
            && self.globs().index.is_empty()
            && self.magic().is_empty();
        if empty && !self.warned_empty.swap(true, Ordering::Relaxed) {
            warn!(dirs = ?self.mime_dirs, "no mime database resources found");
        }
    }
}

/// Implicit parent for types with no explicit declaration: text types
/// derive from `text/plain`, ordinary file types from the catch-all type,
/// and the reserved non-file groups from nothing.
fn fallback_parent(name: &str) -> Option<&'static str> {
    let group = name.split('/').next().unwrap_or("");
    if group == "text" && name != PLAIN_TEXT_TYPE {
        return Some(PLAIN_TEXT_TYPE);
    }
    if !matches!(group, "inode" | "all" | "fonts" | "print" | "uri") && name != DEFAULT_TYPE {
        return Some(DEFAULT_TYPE);
    }
    None
}

#[cfg(unix)]
fn special_inode_kind(file_type: &std::fs::FileType) -> Option<InodeKind> {
    use std::os::unix::fs::FileTypeExt;
    if file_type.is_char_device() {
        Some(InodeKind::CharDevice)
    } else if file_type.is_block_device() {
        Some(InodeKind::BlockDevice)
    } else if file_type.is_fifo() {
        Some(InodeKind::Fifo)
    } else if file_type.is_socket() {
        Some(InodeKind::Socket)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn special_inode_kind(_file_type: &std::fs::FileType) -> Option<InodeKind> {
    None
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}
