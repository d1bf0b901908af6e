//! Post-match result filtering.

use camino::Utf8Path;
use gs_core::ExtensionSet;

/// Decides whether a matched file is reported.
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    excluded_extensions: ExtensionSet,
    reject_control_chars: bool,
}

impl ResultFilter {
    /// Creates a filter that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops files whose extension is in `extensions`.
    #[must_use]
    pub fn with_excluded_extensions(mut self, extensions: ExtensionSet) -> Self {
        self.excluded_extensions = extensions;
        self
    }

    /// Drops files whose name contains a control character (below `0x20`).
    #[must_use]
    pub const fn with_reject_control_chars(mut self, reject: bool) -> Self {
        self.reject_control_chars = reject;
        self
    }

    /// Returns `true` if `path` should be reported.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use gs_core::ExtensionSet;
    /// use gs_scanner::ResultFilter;
    ///
    /// let filter = ResultFilter::new()
    ///     .with_excluded_extensions(["tmp"].into_iter().collect::<ExtensionSet>())
    ///     .with_reject_control_chars(true);
    /// assert!(filter.accepts(Utf8Path::new("/data/report.txt")));
    /// assert!(!filter.accepts(Utf8Path::new("/data/report.tmp")));
    /// assert!(!filter.accepts(Utf8Path::new("/data/bad\u{7}name.txt")));
    /// ```
    #[must_use]
    pub fn accepts(&self, path: &Utf8Path) -> bool {
        if self.excluded_extensions.excludes(path) {
            return false;
        }
        if self.reject_control_chars {
            let name = path.file_name().unwrap_or(path.as_str());
            if name.chars().any(|c| u32::from(c) < 0x20) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accepts_everything() {
        let filter = ResultFilter::new();
        assert!(filter.accepts(Utf8Path::new("/a/b.tmp")));
        assert!(filter.accepts(Utf8Path::new("/a/line\nbreak")));
    }

    #[test]
    fn test_excluded_extensions() {
        let filter = ResultFilter::new()
            .with_excluded_extensions(["bak", ".swp"].into_iter().collect::<ExtensionSet>());
        assert!(!filter.accepts(Utf8Path::new("/a/notes.bak")));
        assert!(!filter.accepts(Utf8Path::new("/a/.notes.swp")));
        assert!(filter.accepts(Utf8Path::new("/a/notes.txt")));
        assert!(filter.accepts(Utf8Path::new("/a/bak")));
    }

    #[test]
    fn test_control_chars_only_checked_in_file_name() {
        let filter = ResultFilter::new().with_reject_control_chars(true);
        assert!(!filter.accepts(Utf8Path::new("/a/tab\there.txt")));
        assert!(filter.accepts(Utf8Path::new("/a/plain.txt")));
        // Space is 0x20 and stays allowed.
        assert!(filter.accepts(Utf8Path::new("/a/with space.txt")));
    }
}
