//! The mimetype value type.

use mimedb_magic::DEFAULT_TYPE;

/// Special-cased kinds of mimetype, chosen by name.
///
/// Directories and desktop entries historically had subtype-specific icon
/// behavior; here that is a closed set of variants rather than dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeTypeKind {
    Generic,
    Directory,
    DesktopEntry,
}

/// An immutable snapshot of one declared mimetype.
///
/// Produced on demand from the database tables; identity is the name, so
/// two snapshots of the same type from different lookups compare equal
/// even when taken across an [`invalidate`](crate::MimeDb::invalidate).
#[derive(Debug, Clone)]
pub struct MimeType {
    name: String,
    glob_patterns: Vec<String>,
    icon_name: Option<String>,
    generic_icon_name: Option<String>,
}

impl MimeType {
    pub(crate) fn new(
        name: String,
        glob_patterns: Vec<String>,
        icon_name: Option<String>,
        generic_icon_name: Option<String>,
    ) -> Self {
        Self {
            name,
            glob_patterns,
            icon_name,
            generic_icon_name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MimeTypeKind {
        match self.name.as_str() {
            "inode/directory" => MimeTypeKind::Directory,
            "application/x-desktop" => MimeTypeKind::DesktopEntry,
            _ => MimeTypeKind::Generic,
        }
    }

    /// Glob patterns declared for this type, main pattern first.
    pub fn glob_patterns(&self) -> &[String] {
        &self.glob_patterns
    }

    /// Preferred extension when saving a file of this type: the extension
    /// of the first simple `*.ext` pattern.
    pub fn main_extension(&self) -> Option<&str> {
        self.glob_patterns.iter().find_map(|pattern| {
            let ext = pattern.strip_prefix("*.")?;
            if ext.is_empty() || ext.contains(['*', '?', '[']) {
                None
            } else {
                Some(ext)
            }
        })
    }

    /// Icon name: the database's declaration if any, else derived from the
    /// type name.
    pub fn icon_name(&self) -> String {
        match &self.icon_name {
            Some(icon) => icon.clone(),
            None => self.name.replace('/', "-"),
        }
    }

    /// Generic icon name: declared, or the kind-specific fallback.
    pub fn generic_icon_name(&self) -> String {
        if let Some(icon) = &self.generic_icon_name {
            return icon.clone();
        }
        match self.kind() {
            MimeTypeKind::Directory => "folder".to_string(),
            MimeTypeKind::DesktopEntry => "application-x-executable".to_string(),
            MimeTypeKind::Generic => {
                let media = self.name.split('/').next().unwrap_or("application");
                format!("{media}-x-generic")
            }
        }
    }

    /// Whether this is the catch-all type.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_TYPE
    }
}

impl PartialEq for MimeType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MimeType {}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> MimeType {
        MimeType::new(name.to_string(), Vec::new(), None, None)
    }

    #[test]
    fn kind_by_name() {
        assert_eq!(plain("inode/directory").kind(), MimeTypeKind::Directory);
        assert_eq!(plain("application/x-desktop").kind(), MimeTypeKind::DesktopEntry);
        assert_eq!(plain("text/plain").kind(), MimeTypeKind::Generic);
    }

    #[test]
    fn derived_icon_names() {
        let t = plain("text/x-readme");
        assert_eq!(t.icon_name(), "text-x-readme");
        assert_eq!(t.generic_icon_name(), "text-x-generic");
        assert_eq!(plain("inode/directory").generic_icon_name(), "folder");
    }

    #[test]
    fn declared_icons_win() {
        let t = MimeType::new(
            "image/png".to_string(),
            Vec::new(),
            Some("png-icon".to_string()),
            Some("image-x-generic".to_string()),
        );
        assert_eq!(t.icon_name(), "png-icon");
        assert_eq!(t.generic_icon_name(), "image-x-generic");
    }

    #[test]
    fn main_extension_skips_complex_patterns() {
        let t = MimeType::new(
            "text/x-c".to_string(),
            vec!["[Mm]akefile".to_string(), "*.c".to_string()],
            None,
            None,
        );
        assert_eq!(t.main_extension(), Some("c"));
        assert_eq!(plain("text/plain").main_extension(), None);
    }

    #[test]
    fn identity_is_the_name() {
        let a = plain("text/plain");
        let b = MimeType::new(
            "text/plain".to_string(),
            vec!["*.txt".to_string()],
            None,
            None,
        );
        assert_eq!(a, b);
    }
}
