//! Wildcard-to-matcher compilation.
//!
//! Pattern syntax:
//!
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `**` as a whole segment matches any number of path components
//!
//! Every other character matches itself. All matchers are anchored and
//! case-insensitive.

use regex::{Regex, RegexBuilder};

use crate::error::ScanError;

/// The segment that switches a walk into recursive mode.
pub const RECURSIVE_MARKER: &str = "**";

/// Returns `true` if `path` contains a wildcard character.
///
/// # Examples
///
/// ```
/// use gs_scanner::is_wildcard;
///
/// assert!(is_wildcard("src/*.rs"));
/// assert!(is_wildcard("file?.txt"));
/// assert!(!is_wildcard("src/main.rs"));
/// ```
#[inline]
#[must_use]
pub fn is_wildcard(path: &str) -> bool {
    path.contains(['*', '?'])
}

/// Translates one wildcard segment into an unanchored regex fragment.
///
/// # Examples
///
/// ```
/// use gs_scanner::segment_to_regex;
///
/// assert_eq!(segment_to_regex("*.txt"), r".*\.txt");
/// assert_eq!(segment_to_regex("a?c"), "a.c");
/// assert_eq!(segment_to_regex("(1)"), r"\(1\)");
/// ```
#[must_use]
pub fn segment_to_regex(segment: &str) -> String {
    let mut regex = String::with_capacity(segment.len() * 2);
    push_segment(&mut regex, segment);
    regex
}

fn push_segment(regex: &mut String, segment: &str) {
    let mut buf = [0_u8; 4];
    for ch in segment.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
}

/// Compiles a single path segment into an anchored file-name matcher.
///
/// # Errors
///
/// Returns [`ScanError::InvalidPattern`] if the resulting regex is rejected,
/// for example because it exceeds the regex size limit.
pub fn compile_segment(segment: &str) -> Result<Regex, ScanError> {
    build(segment, &segment_to_regex(segment))
}

/// Compiles the segments from a `**` marker onward into one matcher for
/// paths relative to the marker's directory.
///
/// The segments are joined with `/` and each `**` becomes "anything". The
/// matcher is tested against relative paths written with a leading `/`,
/// such as `/a/b/c.txt`.
///
/// # Errors
///
/// Returns [`ScanError::InvalidPattern`] if the resulting regex is rejected.
///
/// # Examples
///
/// ```
/// use gs_scanner::compile_recursive;
///
/// let matcher = compile_recursive(&["**", "*.txt"])?;
/// assert!(matcher.is_match("/a/b/notes.TXT"));
/// assert!(!matcher.is_match("/a/b/notes.md"));
/// # Ok::<(), gs_scanner::ScanError>(())
/// ```
pub fn compile_recursive(segments: &[&str]) -> Result<Regex, ScanError> {
    let mut regex = String::new();
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            regex.push('/');
        }
        if *segment == RECURSIVE_MARKER {
            regex.push_str(".*");
        } else {
            push_segment(&mut regex, segment);
        }
    }
    build(&segments.join("/"), &regex)
}

fn build(source: &str, body: &str) -> Result<Regex, ScanError> {
    RegexBuilder::new(&format!("^(?:{body})$"))
        .case_insensitive(true)
        .build()
        .map_err(|e| ScanError::invalid_pattern(source, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("*"));
        assert!(is_wildcard("a/**/b"));
        assert!(is_wildcard("?"));
        assert!(!is_wildcard(""));
        assert!(!is_wildcard("/usr/share/doc"));
    }

    #[test]
    fn test_segment_matchers() {
        let matcher = compile_segment("*.txt").unwrap();
        assert!(matcher.is_match("notes.txt"));
        assert!(matcher.is_match(".txt"));
        assert!(!matcher.is_match("notes_txt"));
        assert!(!matcher.is_match("notes.txt.bak"));

        let matcher = compile_segment("file?").unwrap();
        assert!(matcher.is_match("file1"));
        assert!(!matcher.is_match("file"));
        assert!(!matcher.is_match("file12"));
    }

    #[test]
    fn test_segment_matching_is_case_insensitive() {
        let matcher = compile_segment("Readme.*").unwrap();
        assert!(matcher.is_match("README.md"));
        assert!(matcher.is_match("readme.TXT"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let matcher = compile_segment("report[1]+(final).txt").unwrap();
        assert!(matcher.is_match("report[1]+(final).txt"));
        assert!(!matcher.is_match("report1final.txt"));
    }

    #[test]
    fn test_recursive_matcher() {
        let matcher = compile_recursive(&["**", "b", "**", "*.*"]).unwrap();
        assert!(matcher.is_match("/a/b/c/c1.txt"));
        assert!(matcher.is_match("/a/b/c/d.0/e.txt"));
        assert!(!matcher.is_match("/a/b/b1.txt"));
        assert!(!matcher.is_match("/a/c/c1.txt"));
    }

    #[test]
    fn test_recursive_star_crosses_separators() {
        let matcher = compile_recursive(&["**", "*.log"]).unwrap();
        assert!(matcher.is_match("/x.log"));
        assert!(matcher.is_match("/deep/er/x.LOG"));
    }
}
