use regex::{Regex, RegexBuilder};

use crate::entry::LogEntry;
use crate::error::LiveLogError;
use crate::results::MatchSpan;
use crate::traits::LogFilter;

/// Matches entries containing a fixed piece of text.
///
/// Case-insensitive matching is Unicode-aware; spans are byte offsets into
/// the original (not case-folded) text.
pub struct SubstringFilter {
    needle: String,
    ignore_case: bool,
    folded: Option<Regex>,
}

impl SubstringFilter {
    /// # Errors
    ///
    /// `InvalidPattern` if `needle` is empty.
    pub fn new(needle: impl Into<String>, ignore_case: bool) -> Result<Self, LiveLogError> {
        let needle = needle.into();
        if needle.is_empty() {
            return Err(LiveLogError::InvalidPattern("substring may not be empty".into()));
        }

        let folded = if ignore_case {
            let regex = RegexBuilder::new(&regex::escape(&needle))
                .case_insensitive(true)
                .build()
                .map_err(|e| LiveLogError::InvalidPattern(e.to_string()))?;
            Some(regex)
        } else {
            None
        };

        Ok(Self {
            needle,
            ignore_case,
            folded,
        })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }
}

impl LogFilter for SubstringFilter {
    fn is_match(&self, entry: &LogEntry) -> bool {
        match &self.folded {
            Some(regex) => regex.is_match(&entry.raw_content),
            None => entry.raw_content.contains(&self.needle),
        }
    }

    /// Every non-overlapping occurrence, scanning left to right and resuming
    /// after the end of each hit.
    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
        match &self.folded {
            Some(regex) => regex
                .find_iter(&entry.raw_content)
                .map(|m| MatchSpan::new(m.start(), m.len()))
                .collect(),
            None => entry
                .raw_content
                .match_indices(&self.needle)
                .map(|(start, hit)| MatchSpan::new(start, hit.len()))
                .collect(),
        }
    }
}
