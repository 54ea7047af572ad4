//! Stateless line matcher

use crate::error::{Result, UrlForgeError};
use regex::Regex;
use serde::Serialize;

/// Per-line verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub line: String,
    pub matched: bool,
}

/// Checks lines against a full regular expression
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Match anchored at the start of each line; a trailing `$` in the
    /// pattern anchors the end as well.
    pub fn new(pattern: &str) -> Result<Self> {
        Self::compile(pattern, "^(?:", ")")
    }

    /// Match the whole line
    pub fn full(pattern: &str) -> Result<Self> {
        Self::compile(pattern, "^(?:", ")$")
    }

    fn compile(pattern: &str, prefix: &str, suffix: &str) -> Result<Self> {
        // Validate the pattern on its own so wrapping cannot mask an unbalanced group
        Regex::new(pattern).map_err(syntax_error)?;
        let regex = Regex::new(&format!("{}{}{}", prefix, pattern, suffix)).map_err(syntax_error)?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Classify lines, trimming surrounding whitespace first
    pub fn classify<'a, I>(&'a self, lines: I) -> impl Iterator<Item = MatchResult> + 'a
    where
        I: IntoIterator + 'a,
        I::Item: AsRef<str>,
    {
        lines.into_iter().map(move |line| {
            let line = line.as_ref().trim().to_string();
            let matched = self.is_match(&line);
            MatchResult { line, matched }
        })
    }
}

fn syntax_error(err: regex::Error) -> UrlForgeError {
    UrlForgeError::pattern_syntax(err.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_lines() {
        let matcher = Matcher::new(r"^https://x\.io/[a-z0-9]{6}$").unwrap();
        let results: Vec<MatchResult> = matcher
            .classify(["https://x.io/abc123", "not-a-url"])
            .collect();
        assert!(results[0].matched);
        assert!(!results[1].matched);
        assert_eq!(results[1].line, "not-a-url");
    }

    #[test]
    fn test_match_is_anchored_at_start() {
        let matcher = Matcher::new(r"abc").unwrap();
        assert!(matcher.is_match("abcdef"));
        assert!(!matcher.is_match("xabc"));

        let full = Matcher::full(r"abc").unwrap();
        assert!(!full.is_match("abcdef"));
    }

    #[test]
    fn test_invalid_pattern_is_syntax_error() {
        assert!(matches!(
            Matcher::new("https://x.io/[a-z"),
            Err(UrlForgeError::PatternSyntax { .. })
        ));
        assert!(matches!(
            Matcher::new(r"a)|(?:b"),
            Err(UrlForgeError::PatternSyntax { .. })
        ));
    }
}
