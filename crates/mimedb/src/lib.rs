//! Mimetype resolution engine over the shared mime database.
//!
//! [`MimeDb`] classifies files and buffers into mimetype names using three
//! independent signals: the file name (glob rules), the byte content
//! (magic rules), and file-mode bits (directories, devices, executables).
//! The signals are reconciled by a fixed policy in [`MimeDb::resolve`];
//! each answer carries an accuracy from 0 to 100.
//!
//! Data comes from the standard database layout under each search
//! directory: the precompiled `mime.cache` binary index when a trustworthy
//! set of caches exists, otherwise the text sources (`globs2`, `magic`,
//! `aliases`, `subclasses`, `types`). Tables are parsed lazily on first
//! use and memoized until [`MimeDb::invalidate`].
//!
//! ```no_run
//! use mimedb::MimeDb;
//!
//! let db = MimeDb::new();
//! let answer = db.resolve(mimedb::ResolveInput::default().file_name("notes.txt"));
//! assert_eq!(answer.mime_type, "text/plain");
//! ```

pub mod database;
pub mod error;
pub mod mime_type;
pub mod paths;

mod text_provider;

pub use database::{InodeKind, Match, MimeDb, ResolveInput};
pub use error::MimeDbError;
pub use mime_type::{MimeType, MimeTypeKind};

pub use mimedb_magic::{DEFAULT_TYPE, PLAIN_TEXT_TYPE, ZERO_SIZE_TYPE};

/// Mimetype of directories.
pub const DIRECTORY_TYPE: &str = "inode/directory";

/// Mimetype assigned to executables whose name cannot be trusted.
pub const EXECUTABLE_TYPE: &str = "application/x-executable";
