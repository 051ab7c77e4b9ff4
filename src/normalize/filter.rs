//! Exclusion filter for metric names.

use crate::{Error, Result};

use regex::Regex;

/// Compiled set of metric-name exclusion patterns.
#[derive(Debug, Default)]
pub struct PatternFilter {
    patterns: Vec<Regex>,
}

impl PatternFilter {
    /// Compile a comma-separated list of regular expressions.
    ///
    /// An empty string compiles to an empty filter that excludes nothing.
    /// Any invalid sub-pattern is a fatal configuration error.
    pub fn compile(patterns_str: &str) -> Result<Self> {
        if patterns_str.is_empty() {
            return Ok(Self::default());
        }
        let mut patterns = Vec::new();
        for raw in patterns_str.split(',') {
            let trimmed = raw.trim();
            let regex = Regex::new(trimmed).map_err(|e| Error::Pattern {
                pattern: trimmed.to_string(),
                reason: e.to_string(),
            })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    /// Whether `name` matches any exclusion pattern (unanchored search).
    pub fn is_excluded(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_excludes_nothing() {
        let filter = PatternFilter::compile("").unwrap();
        assert!(!filter.is_excluded("podLatency"));
        assert!(!filter.is_excluded(""));
    }

    #[test]
    fn test_search_semantics_are_unanchored() {
        let filter = PatternFilter::compile("Latency").unwrap();
        assert!(filter.is_excluded("podLatencyQuantiles"));
        assert!(!filter.is_excluded("cpuUsage"));
    }

    #[test]
    fn test_multiple_patterns_any_match_excludes() {
        let filter = PatternFilter::compile("^etcd, Burst$").unwrap();
        assert!(filter.is_excluded("etcdDiskSync"));
        assert!(filter.is_excluded("apiBurst"));
        assert!(!filter.is_excluded("podLatency"));
    }

    #[test]
    fn test_invalid_pattern_fails_compilation() {
        let err = PatternFilter::compile("valid,(unclosed").unwrap_err();
        match err {
            Error::Pattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected pattern error, got {other}"),
        }
    }
}
