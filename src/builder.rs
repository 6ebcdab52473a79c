use std::sync::Arc;
use std::time::Duration;

use crate::engine::LogSourceSearch;
use crate::error::LiveLogError;
use crate::filter::{self, SubstringFilter};
use crate::notifier::NotifierPolicy;
use crate::scheduler::Scheduler;
use crate::traits::{LogFilter, LogSource};

/// How often a search drains its queued notifications by default.
const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// SearchBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring and starting a live search.
///
/// Created via [`livelog::search()`](crate::search). Configure with chained
/// builder methods, then call [`start()`](SearchBuilder::start) to subscribe
/// to the source and register the search task.
///
/// # Example
///
/// ```rust,ignore
/// let search = livelog::search()
///     .source(my_source.clone())
///     .matching("timeout")
///     .ignore_case(false)
///     .interval(Duration::from_millis(50))
///     .start(scheduler.clone())?;
/// ```
pub struct SearchBuilder {
    source:      Option<Arc<dyn LogSource>>,
    term:        Option<String>,
    filter:      Option<Box<dyn LogFilter>>,
    ignore_case: bool,
    policy:      NotifierPolicy,
    interval:    Duration,
}

impl Default for SearchBuilder {
    fn default() -> Self {
        Self {
            source:      None,
            term:        None,
            filter:      None,
            ignore_case: true,
            policy:      NotifierPolicy::default(),
            interval:    DEFAULT_INTERVAL,
        }
    }
}

impl SearchBuilder {
    // ── Source ────────────────────────────────────────────────────────────

    /// Set the source to search through.
    ///
    /// The builder takes ownership; pass a clone for sources that are cheap
    /// handles such as [`InMemoryLogSource`](crate::InMemoryLogSource).
    pub fn source(mut self, s: impl LogSource + 'static) -> Self {
        self.source = Some(Arc::new(s));
        self
    }

    /// Set a source that is already shared.
    pub fn shared_source(mut self, s: Arc<dyn LogSource>) -> Self {
        self.source = Some(s);
        self
    }

    // ── Filter ────────────────────────────────────────────────────────────

    /// Search for occurrences of `term`.
    ///
    /// Every non-overlapping occurrence becomes one match. Case-insensitive
    /// unless `.ignore_case(false)` is set.
    pub fn matching(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    /// Restrict the search with an arbitrary filter.
    ///
    /// Combined with `.matching()`, an entry must pass both and the matches
    /// carry the spans of both. Entries passing a filter that reports no
    /// spans match as a whole.
    pub fn with_filter(mut self, f: impl LogFilter + 'static) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    pub fn ignore_case(mut self, yes: bool) -> Self {
        self.ignore_case = yes;
        self
    }

    // ── Throttling ────────────────────────────────────────────────────────

    /// Largest section fetched from the source at once. Defaults to 1000.
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.policy.max_batch_size = n;
        self
    }

    /// Longest time small appends are held back before the search hears of
    /// them. Defaults to 10 ms.
    pub fn max_wait(mut self, d: Duration) -> Self {
        self.policy.min_interval = d;
        self
    }

    /// Minimum time between two runs of the search task. Defaults to 100 ms.
    pub fn interval(mut self, d: Duration) -> Self {
        self.interval = d;
        self
    }

    // ── Start ─────────────────────────────────────────────────────────────

    /// Subscribe to the source and register the search task on `scheduler`.
    ///
    /// The search starts empty; matches appear once the task has run.
    ///
    /// # Errors
    ///
    /// Returns `Err` for configuration errors: no source, neither a search
    /// term nor a filter (or an empty term), or a zero batch size.
    pub fn start(self, scheduler: Arc<dyn Scheduler>) -> Result<LogSourceSearch, LiveLogError> {
        let source = self.source.ok_or(LiveLogError::MissingSource)?;
        self.policy.validate()?;

        let mut filters: Vec<Box<dyn LogFilter>> = Vec::new();
        match self.term {
            Some(term) if term.is_empty() => return Err(LiveLogError::EmptySearchTerm),
            Some(term) => filters.push(Box::new(SubstringFilter::new(&term, self.ignore_case)?)),
            None => {}
        }
        filters.extend(self.filter);
        if filters.is_empty() {
            return Err(LiveLogError::EmptySearchTerm);
        }

        Ok(LogSourceSearch::start(
            source,
            filter::all(filters),
            scheduler,
            self.policy,
            self.interval,
        ))
    }
}
