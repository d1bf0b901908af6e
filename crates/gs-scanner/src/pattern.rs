//! Pattern resolution: literal root plus compiled wildcard segments.
//!
//! A pattern such as `logs/2024-*/**/*.gz` splits into:
//!
//! - the literal root `logs`, walked from directly
//! - segment matchers for `2024-*`, applied one directory level at a time
//! - a recursive matcher for `**/*.gz`, applied to every file below the
//!   directory where `**` starts
//!
//! Patterns without wildcards skip all of this and resolve to a plain path.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::ScanError;
use crate::glob::{RECURSIVE_MARKER, compile_recursive, compile_segment, is_wildcard};

/// A wildcard pattern compiled for one walk. Immutable once built.
#[derive(Debug)]
pub struct CompiledPattern {
    source: String,
    root: Utf8PathBuf,
    segments: SmallVec<[Regex; 4]>,
    recursive: Option<Regex>,
}

impl CompiledPattern {
    /// The pattern with separators normalized to `/`.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The wildcard-free directory the walk starts from.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Number of per-level segment matchers before any `**`.
    #[inline]
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The segment matcher at `index`, if any.
    #[inline]
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&Regex> {
        self.segments.get(index)
    }

    /// The matcher for everything from `**` onward, if the pattern has one.
    #[inline]
    #[must_use]
    pub const fn recursive(&self) -> Option<&Regex> {
        self.recursive.as_ref()
    }

    /// Returns `true` if `index` is the final segment of a non-recursive pattern.
    #[inline]
    #[must_use]
    pub fn is_last(&self, index: usize) -> bool {
        self.recursive.is_none() && index + 1 >= self.segments.len()
    }
}

/// The outcome of resolving one pattern.
#[derive(Debug)]
pub enum ResolvedPattern {
    /// No wildcards: the pattern names exactly one path.
    Literal(Utf8PathBuf),
    /// Wildcards present: walk from the root with the compiled matchers.
    Wildcard(CompiledPattern),
}

/// Splits patterns into a literal root and compiled wildcard segments.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternResolver;

impl PatternResolver {
    /// Creates a resolver.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] if the pattern ends with `**`
    /// or a segment can't be compiled.
    ///
    /// # Examples
    ///
    /// ```
    /// use gs_scanner::{PatternResolver, ResolvedPattern};
    ///
    /// let resolver = PatternResolver::new();
    /// match resolver.resolve(r"data\2024\*.csv")? {
    ///     ResolvedPattern::Wildcard(compiled) => {
    ///         assert_eq!(compiled.root().as_str(), "data/2024");
    ///         assert_eq!(compiled.segment_count(), 1);
    ///     }
    ///     ResolvedPattern::Literal(_) => unreachable!(),
    /// }
    /// # Ok::<(), gs_scanner::ScanError>(())
    /// ```
    pub fn resolve(&self, pattern: &str) -> Result<ResolvedPattern, ScanError> {
        if !is_wildcard(pattern) {
            return Ok(ResolvedPattern::Literal(Utf8PathBuf::from(pattern)));
        }

        let source = pattern.replace('\\', "/");
        let parts: Vec<&str> = source.split('/').filter(|part| !part.is_empty()).collect();
        let Some((last, leading)) = parts.split_last() else {
            return Err(ScanError::invalid_pattern(&source, "no path segments"));
        };
        if *last == RECURSIVE_MARKER {
            return Err(ScanError::invalid_pattern(&source, "could not finish with **"));
        }

        let root_len = leading.iter().take_while(|part| !is_wildcard(part)).count();
        let root = build_root(&parts[..root_len], source.starts_with('/'));

        let dynamic = &parts[root_len..];
        let marker = dynamic.iter().position(|part| *part == RECURSIVE_MARKER);
        let per_level = marker.map_or(dynamic, |m| &dynamic[..m]);

        let segments = per_level
            .iter()
            .map(|part| compile_segment(part))
            .collect::<Result<SmallVec<[Regex; 4]>, _>>()?;
        let recursive = marker
            .map(|m| compile_recursive(&dynamic[m..]))
            .transpose()?;

        debug!(
            pattern = %source,
            root = %root,
            segments = segments.len(),
            recursive = recursive.is_some(),
            "Resolved pattern"
        );

        Ok(ResolvedPattern::Wildcard(CompiledPattern {
            source,
            root,
            segments,
            recursive,
        }))
    }
}

fn build_root(parts: &[&str], absolute: bool) -> Utf8PathBuf {
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => Utf8PathBuf::from(format!("/{joined}")),
        (false, true) => Utf8PathBuf::from("."),
        (false, false) => Utf8PathBuf::from(joined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wildcard(pattern: &str) -> CompiledPattern {
        match PatternResolver::new().resolve(pattern).unwrap() {
            ResolvedPattern::Wildcard(compiled) => compiled,
            ResolvedPattern::Literal(path) => unreachable!("unexpected literal {path}"),
        }
    }

    #[test]
    fn test_literal_pattern() {
        let resolved = PatternResolver::new().resolve("src/main.rs").unwrap();
        assert!(matches!(resolved, ResolvedPattern::Literal(p) if p == "src/main.rs"));
    }

    #[test]
    fn test_trailing_recursive_marker_rejected() {
        let err = PatternResolver::new().resolve("test2/**/c/**").unwrap_err();
        assert!(matches!(err, ScanError::InvalidPattern { .. }));
    }

    #[test]
    fn test_root_and_segments() {
        let compiled = wildcard("a/b/*/d/*.txt");
        assert_eq!(compiled.root().as_str(), "a/b");
        assert_eq!(compiled.segment_count(), 3);
        assert!(compiled.recursive().is_none());
        assert!(!compiled.is_last(1));
        assert!(compiled.is_last(2));
    }

    #[test]
    fn test_last_segment_never_joins_root() {
        let compiled = wildcard("*.rs");
        assert_eq!(compiled.root().as_str(), ".");
        assert_eq!(compiled.segment_count(), 1);
    }

    #[test]
    fn test_absolute_root_is_kept() {
        let compiled = wildcard("/var/log/*.log");
        assert_eq!(compiled.root().as_str(), "/var/log");

        let compiled = wildcard("/*");
        assert_eq!(compiled.root().as_str(), "/");
    }

    #[test]
    fn test_backslashes_are_normalized() {
        let compiled = wildcard(r"test1\**\*.*");
        assert_eq!(compiled.source(), "test1/**/*.*");
        assert_eq!(compiled.root().as_str(), "test1");
        assert_eq!(compiled.segment_count(), 0);
        assert!(compiled.recursive().is_some());
    }

    #[test]
    fn test_segments_before_recursive_marker() {
        let compiled = wildcard("logs/2024-*/**/*.gz");
        assert_eq!(compiled.root().as_str(), "logs");
        assert_eq!(compiled.segment_count(), 1);
        assert!(!compiled.is_last(0));

        let recursive = compiled.recursive().unwrap();
        assert!(recursive.is_match("/x/y/app.gz"));
        assert!(recursive.is_match("/app.GZ"));
    }
}
