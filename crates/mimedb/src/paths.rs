//! Search directory discovery.

use std::env;
use std::path::PathBuf;

/// Mime directories in precedence order, most local first.
///
/// Follows the base-directory convention: `$XDG_DATA_HOME` (default
/// `~/.local/share`) then each entry of `$XDG_DATA_DIRS` (default
/// `/usr/local/share:/usr/share`), each with `mime` appended.
pub fn default_mime_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match env::var_os("XDG_DATA_HOME") {
        Some(home) if !home.is_empty() => dirs.push(PathBuf::from(home)),
        _ => {
            if let Some(home) = env::var_os("HOME") {
                dirs.push(PathBuf::from(home).join(".local/share"));
            }
        }
    }
    match env::var_os("XDG_DATA_DIRS") {
        Some(list) if !list.is_empty() => {
            dirs.extend(env::split_paths(&list));
        }
        _ => {
            dirs.push(PathBuf::from("/usr/local/share"));
            dirs.push(PathBuf::from("/usr/share"));
        }
    }
    dirs.into_iter().map(|dir| dir.join("mime")).collect()
}
