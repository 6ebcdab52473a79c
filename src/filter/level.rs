use crate::entry::{LevelFlags, LogEntry};
use crate::results::MatchSpan;
use crate::traits::LogFilter;

/// Matches entries whose level is contained in a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFilter {
    levels: LevelFlags,
}

impl LevelFilter {
    pub const fn new(levels: LevelFlags) -> Self {
        Self { levels }
    }

    pub const fn levels(&self) -> LevelFlags {
        self.levels
    }
}

impl LogFilter for LevelFilter {
    fn is_match(&self, entry: &LogEntry) -> bool {
        self.levels.intersects(entry.level)
    }

    fn find_matches(&self, _entry: &LogEntry) -> Vec<MatchSpan> {
        Vec::new()
    }
}

/// Matches every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl LogFilter for AcceptAll {
    fn is_match(&self, _entry: &LogEntry) -> bool {
        true
    }

    fn find_matches(&self, _entry: &LogEntry) -> Vec<MatchSpan> {
        Vec::new()
    }
}

/// Rejects entries that are empty or whitespace only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectEmpty;

impl LogFilter for RejectEmpty {
    fn is_match(&self, entry: &LogEntry) -> bool {
        !entry.raw_content.trim().is_empty()
    }

    fn find_matches(&self, _entry: &LogEntry) -> Vec<MatchSpan> {
        Vec::new()
    }
}
