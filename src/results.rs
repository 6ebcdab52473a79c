use std::time::Duration;

/// A hit within one entry's text: `length` bytes starting at byte `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchSpan {
    pub start: usize,
    pub length: usize,
}

impl MatchSpan {
    pub const fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// One past the last byte of the span.
    pub const fn end(&self) -> usize {
        self.start + self.length
    }
}

/// One search hit: the entry it was found in and where.
///
/// An entry with several hits produces several matches, in span order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogMatch {
    /// Index of the matching entry in its source.
    pub index: usize,

    /// Location of the hit within the entry's text.
    pub span: MatchSpan,
}

impl LogMatch {
    pub const fn new(index: usize, span: MatchSpan) -> Self {
        Self { index, span }
    }
}

/// Counters of a live search since it started.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchStats {
    /// Total number of entries fetched and filtered.
    pub records_scanned: usize,

    /// Current length of the match list.
    pub matches: usize,

    /// Number of fetches the source refused (concurrent truncation etc.).
    pub source_faults: usize,

    /// Time spent fetching and filtering.
    pub busy: Duration,

    /// Entries filtered per second of busy time. Convenience field, equal to
    /// `records_scanned / busy.as_secs_f64()`, clamped to 0 when nothing was
    /// measured yet.
    pub records_per_sec: usize,
}

impl SearchStats {
    /// Compute `records_per_sec` from raw counters.
    pub(crate) fn compute(records_scanned: usize, matches: usize, source_faults: usize, busy: Duration) -> Self {
        let rps = if busy.as_secs_f64() > 0.0 {
            (records_scanned as f64 / busy.as_secs_f64()) as usize
        } else {
            0
        };
        Self {
            records_scanned,
            matches,
            source_faults,
            busy,
            records_per_sec: rps,
        }
    }
}
