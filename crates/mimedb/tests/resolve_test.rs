//! End-to-end resolution against text sources in a temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use mimedb::{InodeKind, MimeDb, ResolveInput, DEFAULT_TYPE, ZERO_SIZE_TYPE};

fn magic_section(priority: u8, mime: &str, offset: u32, value: &[u8]) -> Vec<u8> {
    let mut out = format!("[{priority}:{mime}]\n").into_bytes();
    out.extend_from_slice(format!(">{offset}=").as_bytes());
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    out.push(b'\n');
    out
}

fn write_magic(dir: &Path, sections: &[Vec<u8>]) {
    let mut data = b"MIME-Magic\0\n".to_vec();
    for section in sections {
        data.extend_from_slice(section);
    }
    fs::write(dir.join("magic"), data).unwrap();
}

struct Db {
    _dir: tempfile::TempDir,
    db: MimeDb,
}

fn sample_db() -> Db {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();
    fs::write(
        path.join("globs2"),
        "\
50:text/plain:*.txt
50:application/x-bzip2:*.bz2
50:application/x-bzip2-compressed-tar:*.tar.bz2
80:application/x-short-but-heavy:*.hvy
50:application/x-long-but-light:*.deep.nested.hvy
50:application/zip:*.czip
50:application/vnd.custom:*.czip
50:text/x-microdvd:*.subx
50:text/x-mpsub:*.subx
50:text/x-foo:*.foo
50:application/x-ghost:*.ghost
",
    )
    .unwrap();
    write_magic(
        path,
        &[
            magic_section(50, "application/zip", 0, b"PK\x03\x04"),
            magic_section(60, "application/x-czip-container", 0, b"CZIP"),
            magic_section(80, "application/x-sqlite3", 0, b"SQLite format 3"),
        ],
    );
    fs::write(
        path.join("subclasses"),
        "\
application/vnd.custom application/zip
application/x-bzip2-compressed-tar application/x-bzip2
text/x-microdvd text/plain
text/x-mpsub text/plain
",
    )
    .unwrap();
    fs::write(path.join("aliases"), "application/x-zip application/zip\n").unwrap();
    fs::write(
        path.join("types"),
        "\
text/plain
application/x-bzip2
application/x-bzip2-compressed-tar
application/x-short-but-heavy
application/x-long-but-light
application/zip
application/vnd.custom
application/x-czip-container
application/x-sqlite3
text/x-microdvd
text/x-mpsub
text/x-foo
",
    )
    .unwrap();
    // application/x-ghost is deliberately absent from `types`.
    Db {
        db: MimeDb::with_search_dirs(vec![path.to_path_buf()]),
        _dir: dir,
    }
}

#[test]
fn fast_dict_is_case_insensitive() {
    let f = sample_db();
    let answer = f.db.resolve(ResolveInput::default().file_name("report.TXT"));
    assert_eq!(answer.mime_type, "text/plain");
    assert_eq!(answer.accuracy, 100);
}

#[test]
fn longest_pattern_wins() {
    let f = sample_db();
    assert_eq!(
        f.db.match_file_name("x.tar.bz2"),
        ["application/x-bzip2-compressed-tar"]
    );
}

#[test]
fn weight_dominates_length() {
    let f = sample_db();
    assert_eq!(
        f.db.match_file_name("a.deep.nested.hvy"),
        ["application/x-short-but-heavy"]
    );
}

#[test]
fn zero_byte_content_wins_for_any_name() {
    let f = sample_db();
    let answer = f
        .db
        .resolve(ResolveInput::default().file_name("notes.txt").content(b""));
    assert_eq!(answer.mime_type, ZERO_SIZE_TYPE);
    assert_eq!(answer.accuracy, 100);
}

#[test]
fn subclass_is_reflexive_and_transitive() {
    let f = sample_db();
    assert!(f.db.is_subclass_of("text/plain", "text/plain"));
    assert!(f.db.is_subclass_of("application/vnd.custom", "application/zip"));
    // Two explicit hops down to the implicit terminal type.
    assert!(f
        .db
        .is_subclass_of("application/x-bzip2-compressed-tar", DEFAULT_TYPE));
    assert!(!f.db.is_subclass_of("application/zip", "application/vnd.custom"));
}

#[test]
fn implicit_text_parent() {
    let f = sample_db();
    assert!(f.db.is_subclass_of("text/x-foo", "text/plain"));
    assert_eq!(f.db.parents("text/x-foo"), ["text/plain"]);
}

#[test]
fn cyclic_parent_declarations_terminate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();
    // Two types declared as each other's parent.
    fs::write(
        path.join("subclasses"),
        "application/x-egg application/x-chicken\napplication/x-chicken application/x-egg\n",
    )
    .unwrap();
    let db = MimeDb::with_search_dirs(vec![path.to_path_buf()]);

    assert!(db.is_subclass_of("application/x-egg", "application/x-chicken"));
    assert!(db.is_subclass_of("application/x-chicken", "application/x-egg"));
    assert!(!db.is_subclass_of("application/x-egg", "text/plain"));
    // The walk visits each node once, so the cycle contributes one ancestor.
    assert_eq!(db.ancestors("application/x-egg"), ["application/x-chicken"]);
}

#[test]
fn match_file_name_is_idempotent() {
    let f = sample_db();
    let first = f.db.match_file_name("movie.subx");
    let second = f.db.match_file_name("movie.subx");
    assert_eq!(first, second);
    assert_eq!(
        f.db.extract_known_extension("movie.subx"),
        f.db.extract_known_extension("movie.subx")
    );
}

#[test]
fn magic_without_competing_glob() {
    let f = sample_db();
    let answer = f
        .db
        .resolve(ResolveInput::default().file_name("data.weird").content(b"PK\x03\x04rest"));
    assert_eq!(answer.mime_type, "application/zip");
    assert_eq!(answer.accuracy, 50);
}

#[test]
fn name_and_content_agreement() {
    let f = sample_db();
    // Glob is ambiguous between zip and vnd.custom; content sniffs zip at
    // priority 50 (< 80); vnd.custom inherits zip, so the names agree.
    let answer = f
        .db
        .resolve(ResolveInput::default().file_name("bundle.czip").content(b"PK\x03\x04rest"));
    assert_eq!(answer.mime_type, "application/vnd.custom");
    assert_eq!(answer.accuracy, 100);
}

#[test]
fn high_priority_magic_wins_outright() {
    let f = sample_db();
    let answer = f.db.resolve(
        ResolveInput::default()
            .file_name("claims-to-be.txt.czip")
            .content(b"SQLite format 3\x00"),
    );
    assert_eq!(answer.mime_type, "application/x-sqlite3");
    assert_eq!(answer.accuracy, 80);
}

#[test]
fn directory_mode_beats_everything() {
    let f = sample_db();
    let answer = f.db.resolve(
        ResolveInput::default()
            .file_name("archive.tar.bz2")
            .inode(InodeKind::Directory)
            .content(b"PK\x03\x04"),
    );
    assert_eq!(answer.mime_type, "inode/directory");
    assert_eq!(answer.accuracy, 100);
}

#[test]
fn fast_mode_reports_eighty() {
    let f = sample_db();
    let answer = f
        .db
        .resolve(ResolveInput::default().file_name("notes.txt").fast_mode());
    assert_eq!(answer.mime_type, "text/plain");
    assert_eq!(answer.accuracy, 80);
}

#[test]
fn untrusted_executable_shortcut() {
    let f = sample_db();
    let answer = f.db.resolve(
        ResolveInput::default()
            .file_name("totally-a-text-file.txt")
            .inode(InodeKind::RegularExecutable)
            .untrusted_name(),
    );
    assert_eq!(answer.mime_type, "application/x-executable");
    assert_eq!(answer.accuracy, 100);
}

#[test]
fn trusted_executable_still_uses_globs() {
    let f = sample_db();
    let answer = f.db.resolve(
        ResolveInput::default()
            .file_name("notes.txt")
            .inode(InodeKind::RegularExecutable),
    );
    assert_eq!(answer.mime_type, "text/plain");
}

#[test]
fn ambiguous_globs_tie_break_lexicographically() {
    let f = sample_db();
    let answer = f.db.resolve(ResolveInput::default().file_name("movie.subx"));
    assert_eq!(answer.mime_type, "text/x-microdvd");
    assert_eq!(answer.accuracy, 20);
}

#[test]
fn per_source_default_type() {
    let f = sample_db();
    let answer = f.db.resolve(
        ResolveInput::default()
            .file_name("index")
            .default_type("text/html"),
    );
    assert_eq!(answer.mime_type, "text/html");
    assert_eq!(answer.accuracy, 10);
}

#[test]
fn terminal_fallback_is_octet_stream() {
    let f = sample_db();
    let answer = f.db.resolve(ResolveInput::default().file_name("README"));
    assert_eq!(answer.mime_type, DEFAULT_TYPE);
    assert_eq!(answer.accuracy, 0);
}

#[test]
fn undeclared_glob_target_is_dropped() {
    let f = sample_db();
    // *.ghost names a type absent from `types`: excluded from candidates.
    let answer = f.db.resolve(ResolveInput::default().file_name("spooky.ghost"));
    assert_eq!(answer.mime_type, DEFAULT_TYPE);
    assert_eq!(answer.accuracy, 0);
}

#[test]
fn alias_resolution() {
    let f = sample_db();
    assert_eq!(f.db.resolve_alias("application/x-zip"), "application/zip");
    assert_eq!(f.db.resolve_alias("application/zip"), "application/zip");
    assert!(f.db.is_subclass_of("application/vnd.custom", "application/x-zip"));
}

#[test]
fn ancestors_most_generic_last() {
    let f = sample_db();
    assert_eq!(
        f.db.ancestors("text/x-microdvd"),
        ["text/plain", DEFAULT_TYPE]
    );
    // An alias leads with its canonical name.
    let via_alias = f.db.ancestors("application/x-zip");
    assert_eq!(via_alias[0], "application/zip");
    assert_eq!(via_alias.last().map(String::as_str), Some(DEFAULT_TYPE));
}

#[test]
fn mime_type_snapshot() {
    let f = sample_db();
    let t = f.db.mime_type("application/x-zip").unwrap();
    assert_eq!(t.name(), "application/zip");
    assert_eq!(t.glob_patterns(), ["*.czip"]);
    assert_eq!(t.main_extension(), Some("czip"));
    assert_eq!(t.icon_name(), "application-zip");
    assert_eq!(t.generic_icon_name(), "application-x-generic");
    assert!(f.db.mime_type("application/x-ghost").is_none());
}

#[test]
fn extract_known_extension() {
    let f = sample_db();
    assert_eq!(
        f.db.extract_known_extension("x.tar.bz2").as_deref(),
        Some("tar.bz2")
    );
    assert_eq!(f.db.extract_known_extension("README"), None);
}

#[test]
fn content_only_lookup() {
    let f = sample_db();
    let hit = f.db.match_content(b"hello plain text\n");
    assert_eq!(hit.mime_type, "text/plain");
    assert_eq!(hit.accuracy, 5);
    let hit = f.db.match_content(&[0x00, 0x01]);
    assert_eq!(hit.mime_type, DEFAULT_TYPE);
    assert_eq!(hit.accuracy, 0);
    let hit = f.db.match_content(b"");
    assert_eq!(hit.mime_type, ZERO_SIZE_TYPE);
    assert_eq!(hit.accuracy, 100);
}

#[test]
fn resolve_path_reads_content_and_mode() {
    let f = sample_db();
    let dir = tempfile::tempdir().unwrap();

    let zip = dir.path().join("payload.weird");
    fs::write(&zip, b"PK\x03\x04payload").unwrap();
    let answer = f.db.resolve_path(&zip).unwrap();
    assert_eq!(answer.mime_type, "application/zip");

    let answer = f.db.resolve_path(dir.path()).unwrap();
    assert_eq!(answer.mime_type, "inode/directory");
    assert_eq!(answer.accuracy, 100);

    assert!(f.db.resolve_path(&dir.path().join("missing")).is_err());
}

#[test]
fn invalidate_reloads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().to_path_buf();
    fs::write(path.join("globs2"), "50:text/plain:*.txt\n").unwrap();
    let db = MimeDb::with_search_dirs(vec![path.clone()]);
    assert_eq!(db.match_file_name("a.txt"), ["text/plain"]);

    fs::write(path.join("globs2"), "50:text/x-log:*.txt\n").unwrap();
    // Memoized tables still answer with the old rules.
    assert_eq!(db.match_file_name("a.txt"), ["text/plain"]);
    db.invalidate();
    assert_eq!(db.match_file_name("a.txt"), ["text/x-log"]);
}
