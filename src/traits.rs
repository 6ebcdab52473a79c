use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::entry::LogEntry;
use crate::error::LiveLogError;
use crate::listeners::ListenerToken;
use crate::modification::{Modification, Section};
use crate::notifier::NotifierPolicy;
use crate::results::{LogMatch, MatchSpan};

/// Identity of a [`LogSource`], carried by every notification it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocate a process-unique source identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// A continuously growing (and occasionally truncated or reset) sequence of
/// log entries.
///
/// Implement this to feed livelog from files, sockets, in-memory buffers or
/// anything else that produces records addressable by a zero-based index.
///
/// # Thread Safety
///
/// `Send + Sync` are required: searches fetch entries from scheduler worker
/// threads while the source keeps mutating.
///
/// # Listener contract
///
/// Each listener added through [`add_listener`](LogSource::add_listener) gets
/// its own [`ListenerNotifier`](crate::ListenerNotifier) so a slow listener
/// never holds back a fast one. [`ListenerCollection`](crate::ListenerCollection)
/// implements the bookkeeping; most sources embed one.
pub trait LogSource: Send + Sync {
    /// Identity stamped on every notification this source emits.
    fn id(&self) -> SourceId;

    /// Number of entries currently available. Monotonic until the source resets.
    fn count(&self) -> usize;

    /// Copy the entries covered by `section`.
    ///
    /// Returns `Err` when the section is no longer (or not yet) available,
    /// typically because the source was truncated concurrently. Callers treat
    /// this as recoverable: a `Removed` or `Reset` notification is on its way.
    fn fetch(&self, section: Section) -> Result<Vec<LogEntry>, LiveLogError>;

    /// Subscribe `listener` to modifications, throttled according to `policy`.
    fn add_listener(&self, listener: Arc<dyn LogSourceListener>, policy: NotifierPolicy) -> ListenerToken;

    /// Unsubscribe the listener registered under `token`.
    ///
    /// Returns `false` if no such listener was registered.
    fn remove_listener(&self, token: ListenerToken) -> bool;
}

/// Receives the modification stream of a [`LogSource`].
///
/// Invoked from whichever thread mutates or polls the source, usually a
/// scheduler worker. Implementations must not block indefinitely.
pub trait LogSourceListener: Send + Sync {
    fn on_modified(&self, source: SourceId, modification: Modification);
}

/// A predicate over a single log entry.
///
/// Filters are immutable once built and compose through
/// [`AndFilter`](crate::filter::AndFilter), [`OrFilter`](crate::filter::OrFilter)
/// and [`NotFilter`](crate::filter::NotFilter).
///
/// # Thread Safety
///
/// `Send + Sync` are required: filters are shared between the search task
/// and anyone highlighting results.
///
/// # Example
///
/// ```rust
/// use livelog::{LogEntry, LogFilter, LevelFlags, MatchSpan};
///
/// struct StartsWith(&'static str);
///
/// impl LogFilter for StartsWith {
///     fn is_match(&self, entry: &LogEntry) -> bool {
///         entry.raw_content.starts_with(self.0)
///     }
///
///     fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
///         if self.is_match(entry) {
///             vec![MatchSpan::new(0, self.0.len())]
///         } else {
///             Vec::new()
///         }
///     }
/// }
///
/// let entry = LogEntry::new(0, "GET /index.html", LevelFlags::INFO);
/// assert!(StartsWith("GET").is_match(&entry));
/// ```
pub trait LogFilter: Send + Sync {
    /// Returns `true` if this entry passes the filter.
    fn is_match(&self, entry: &LogEntry) -> bool;

    /// Every span of `entry.raw_content` this filter considers a hit, for
    /// highlighting.
    ///
    /// The spans are independent of the boolean verdict: a non-empty result
    /// does not imply [`is_match`](LogFilter::is_match) returns `true`.
    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan>;
}

impl<F: LogFilter + ?Sized> LogFilter for Box<F> {
    fn is_match(&self, entry: &LogEntry) -> bool {
        (**self).is_match(entry)
    }

    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
        (**self).find_matches(entry)
    }
}

impl<F: LogFilter + ?Sized> LogFilter for Arc<F> {
    fn is_match(&self, entry: &LogEntry) -> bool {
        (**self).is_match(entry)
    }

    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
        (**self).find_matches(entry)
    }
}

/// Identity of a search (or search proxy), passed along with its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchId(u64);

impl SearchId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search#{}", self.0)
    }
}

/// Receives the full, ordered match list of a search whenever it changes.
pub trait SearchListener: Send + Sync {
    fn on_search_modified(&self, search: SearchId, matches: &[LogMatch]);
}
