use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::entry::LogEntry;
use crate::listeners::{ListenerToken, SearchListenerCollection};
use crate::modification::{Modification, Section};
use crate::notifier::NotifierPolicy;
use crate::results::{LogMatch, MatchSpan, SearchStats};
use crate::scheduler::{PeriodicTaskHandle, Scheduler};
use crate::traits::{LogFilter, LogSource, LogSourceListener, SearchId, SearchListener, SourceId};

// ---------------------------------------------------------------------------
// Pending queue
// ---------------------------------------------------------------------------

type Pending = (SourceId, Modification);

/// Subscribed to the source; only queues. All work happens on the search task.
struct Enqueue {
    pending: Sender<Pending>,
}

impl LogSourceListener for Enqueue {
    fn on_modified(&self, source: SourceId, modification: Modification) {
        // Fails only once the search is gone.
        let _ = self.pending.send((source, modification));
    }
}

// ---------------------------------------------------------------------------
// SearchInner
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Counters {
    records_scanned: usize,
    source_faults: usize,
    busy: Duration,
}

struct SearchInner {
    id: SearchId,
    source: Arc<dyn LogSource>,
    filter: Box<dyn LogFilter>,
    pending: Receiver<Pending>,
    /// Source whose notifications are still applied. `None` once detached.
    target: Mutex<Option<SourceId>>,
    /// Only touched by the search task.
    working: Mutex<Vec<LogMatch>>,
    listeners: SearchListenerCollection,
    counters: Mutex<Counters>,
}

impl SearchInner {
    /// Apply every queued notification, then publish once if anything changed.
    fn drain(&self) {
        let mut working = self.working.lock();
        let mut changed = false;

        while let Ok((source, modification)) = self.pending.try_recv() {
            if *self.target.lock() != Some(source) {
                trace!(search = %self.id, %source, %modification, "discarding stale notification");
                continue;
            }

            match modification {
                Modification::Reset => {
                    if !working.is_empty() {
                        working.clear();
                        changed = true;
                    }
                }
                Modification::Removed(section) => {
                    let keep = working.partition_point(|m| m.index < section.index);
                    if keep < working.len() {
                        working.truncate(keep);
                        changed = true;
                    }
                }
                Modification::Appended(section) => {
                    changed |= self.append(section, &mut working);
                }
            }
        }

        if changed {
            let snapshot = Arc::new(working.clone());
            drop(working);
            trace!(search = %self.id, matches = snapshot.len(), "publishing matches");
            self.listeners.publish(snapshot);
        }
    }

    /// Fetch and filter `section`. Returns whether any match was added.
    fn append(&self, section: Section, working: &mut Vec<LogMatch>) -> bool {
        let started = Instant::now();

        let entries = match self.source.fetch(section) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(search = %self.id, %section, error = %e, "fetch failed, section skipped");
                self.counters.lock().source_faults += 1;
                return false;
            }
        };

        let before = working.len();
        for entry in &entries {
            collect_matches(&*self.filter, entry, working);
        }

        let mut counters = self.counters.lock();
        counters.records_scanned += entries.len();
        counters.busy += started.elapsed();

        working.len() != before
    }
}

/// Push one match per hit span of `entry`. An entry that passes the filter
/// without reporting spans (level or negated filters) matches as a whole.
fn collect_matches(filter: &dyn LogFilter, entry: &LogEntry, out: &mut Vec<LogMatch>) {
    if !filter.is_match(entry) {
        return;
    }
    let mut spans = filter.find_matches(entry);
    if spans.is_empty() {
        out.push(LogMatch::new(entry.index, MatchSpan::new(0, entry.raw_content.len())));
    } else {
        spans.sort_unstable();
        // Combined filters may report the same span more than once.
        spans.dedup();
        out.extend(spans.into_iter().map(|span| LogMatch::new(entry.index, span)));
    }
}

// ---------------------------------------------------------------------------
// LogSourceSearch
// ---------------------------------------------------------------------------

/// A live search over one [`LogSource`].
///
/// Subscribes to the source, and on a periodic task applies the queued
/// modifications to an ordered match list: appended sections are fetched and
/// filtered, removed sections truncate the list, a reset clears it.
/// Listeners receive the complete list after every change.
///
/// Created through [`search()`](crate::search). Dropping the search (or
/// calling [`detach`](LogSourceSearch::detach)) unsubscribes it from the
/// source and removes its task.
pub struct LogSourceSearch {
    inner: Arc<SearchInner>,
    scheduler: Arc<dyn Scheduler>,
    task: PeriodicTaskHandle,
    subscription: Mutex<Option<ListenerToken>>,
}

impl LogSourceSearch {
    pub(crate) fn start(
        source: Arc<dyn LogSource>,
        filter: Box<dyn LogFilter>,
        scheduler: Arc<dyn Scheduler>,
        policy: NotifierPolicy,
        interval: Duration,
    ) -> Self {
        let (sender, pending) = unbounded();
        let source_id = source.id();
        let id = SearchId::next();

        let inner = Arc::new(SearchInner {
            id,
            source: Arc::clone(&source),
            filter,
            pending,
            target: Mutex::new(Some(source_id)),
            working: Mutex::new(Vec::new()),
            listeners: SearchListenerCollection::new(id),
            counters: Mutex::new(Counters::default()),
        });

        let token = source.add_listener(Arc::new(Enqueue { pending: sender }), policy);

        let weak: Weak<SearchInner> = Arc::downgrade(&inner);
        let task = scheduler.start_periodic(
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.drain();
                }
            }),
            interval,
            Some("log source search"),
        );

        debug!(
            search = %inner.id,
            source = %source_id,
            interval_ms = interval.as_millis() as u64,
            "search started"
        );

        Self {
            inner,
            scheduler,
            task,
            subscription: Mutex::new(Some(token)),
        }
    }

    pub fn id(&self) -> SearchId {
        self.inner.id
    }

    pub fn source(&self) -> &Arc<dyn LogSource> {
        &self.inner.source
    }

    /// The match list as last published, ordered by entry index.
    pub fn matches(&self) -> Arc<Vec<LogMatch>> {
        self.inner.listeners.current()
    }

    /// Length of [`matches`](LogSourceSearch::matches).
    pub fn count(&self) -> usize {
        self.matches().len()
    }

    pub fn stats(&self) -> SearchStats {
        let counters = self.inner.counters.lock();
        SearchStats::compute(
            counters.records_scanned,
            self.count(),
            counters.source_faults,
            counters.busy,
        )
    }

    /// Subscribe `listener`. It is told the current matches right away.
    pub fn add_listener(&self, listener: Arc<dyn SearchListener>) -> ListenerToken {
        self.inner.listeners.add_listener(listener)
    }

    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        self.inner.listeners.remove_listener(token)
    }

    /// Stop following the source.
    ///
    /// Notifications still queued are discarded and the match list is frozen
    /// at its current state. Idempotent.
    pub fn detach(&self) {
        let Some(token) = self.subscription.lock().take() else {
            return;
        };
        *self.inner.target.lock() = None;
        self.inner.source.remove_listener(token);
        self.scheduler.remove_periodic(&self.task);
        debug!(search = %self.inner.id, "search detached");
    }

    pub fn is_detached(&self) -> bool {
        self.subscription.lock().is_none()
    }
}

impl Drop for LogSourceSearch {
    fn drop(&mut self) {
        self.detach();
    }
}
