//! File extension exclusion set.
//!
//! Extensions are compared exactly (case-sensitive) against the substring
//! after the last `.` of a file name. Entries are stored without a leading
//! dot; `"log"` and `".log"` are accepted as the same extension.

use camino::Utf8Path;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A set of file extensions whose matches are dropped from scan results.
///
/// # Examples
///
/// ```
/// use gs_core::ExtensionSet;
/// use camino::Utf8Path;
///
/// let set: ExtensionSet = ["tmp", ".bak"].into_iter().collect();
/// assert!(set.excludes(Utf8Path::new("/data/report.tmp")));
/// assert!(set.excludes(Utf8Path::new("/data/report.bak")));
/// assert!(!set.excludes(Utf8Path::new("/data/report.TMP")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExtensionSet {
    extensions: FxHashSet<String>,
}

impl ExtensionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an extension, stripping one leading `.` if present.
    pub fn insert(&mut self, extension: &str) {
        let extension = extension.strip_prefix('.').unwrap_or(extension);
        self.extensions.insert(extension.to_owned());
    }

    /// Returns `true` if the extension of `path` is in the set.
    ///
    /// The extension is everything after the last `.` in the file name, so a
    /// dotfile like `.profile` has extension `profile`.
    #[must_use]
    pub fn excludes(&self, path: &Utf8Path) -> bool {
        if self.extensions.is_empty() {
            return false;
        }
        path.file_name()
            .and_then(|name| name.rsplit_once('.'))
            .is_some_and(|(_, ext)| self.extensions.contains(ext))
    }

    /// Returns the number of extensions in the set.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Returns `true` if the set holds no extensions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for ext in iter {
            set.insert(ext.as_ref());
        }
        set
    }
}

impl From<Vec<String>> for ExtensionSet {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().collect()
    }
}

impl From<ExtensionSet> for Vec<String> {
    fn from(value: ExtensionSet) -> Self {
        let mut extensions: Self = value.extensions.into_iter().collect();
        extensions.sort_unstable();
        extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_excludes_nothing() {
        let set = ExtensionSet::new();
        assert!(set.is_empty());
        assert!(!set.excludes(Utf8Path::new("a.txt")));
    }

    #[test]
    fn test_excludes_last_extension_only() {
        let set: ExtensionSet = ["gz"].into_iter().collect();
        assert!(set.excludes(Utf8Path::new("archive.tar.gz")));
        assert!(!set.excludes(Utf8Path::new("archive.gz.tar")));
        assert!(!set.excludes(Utf8Path::new("gz")));
    }

    #[test]
    fn test_case_sensitive() {
        let set: ExtensionSet = ["txt"].into_iter().collect();
        assert!(set.excludes(Utf8Path::new("/x/a.txt")));
        assert!(!set.excludes(Utf8Path::new("/x/a.TXT")));
    }

    #[test]
    fn test_leading_dot_normalized() {
        let set: ExtensionSet = [".log", "log"].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert!(set.excludes(Utf8Path::new("server.log")));
    }

    #[test]
    fn test_serde_as_sorted_list() {
        let set: ExtensionSet = ["tmp", "bak"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["bak","tmp"]"#);
        let parsed: ExtensionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }
}
