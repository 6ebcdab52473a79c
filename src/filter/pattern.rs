use regex::{Regex, RegexBuilder};

use crate::entry::LogEntry;
use crate::error::LiveLogError;
use crate::results::MatchSpan;
use crate::traits::LogFilter;

/// Matches entries against a regular expression.
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    /// # Errors
    ///
    /// `InvalidPattern` if `pattern` is empty or not a valid expression.
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Self, LiveLogError> {
        if pattern.is_empty() {
            return Err(LiveLogError::InvalidPattern("regex may not be empty".into()));
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| LiveLogError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl LogFilter for RegexFilter {
    fn is_match(&self, entry: &LogEntry) -> bool {
        self.regex.is_match(&entry.raw_content)
    }

    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
        self.regex
            .find_iter(&entry.raw_content)
            .filter(|m| !m.is_empty())
            .map(|m| MatchSpan::new(m.start(), m.len()))
            .collect()
    }
}

/// Matches entries against a shell-style wildcard: `*` stands for any run of
/// characters, `?` for exactly one. The pattern may match anywhere in the
/// entry.
pub struct WildcardFilter {
    inner: RegexFilter,
    pattern: String,
}

impl WildcardFilter {
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Self, LiveLogError> {
        if pattern.is_empty() {
            return Err(LiveLogError::InvalidPattern("wildcard may not be empty".into()));
        }
        let inner = RegexFilter::new(&wildcard_to_regex(pattern), ignore_case)?;
        Ok(Self {
            inner,
            pattern: pattern.to_owned(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl LogFilter for WildcardFilter {
    fn is_match(&self, entry: &LogEntry) -> bool {
        self.inner.is_match(entry)
    }

    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
        self.inner.find_matches(entry)
    }
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*?" } else { "." });
            }
            other => literal.push(other),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}
