use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::LiveLogError;
use crate::modification::Modification;
use crate::traits::{LogSourceListener, SourceId};

// ---------------------------------------------------------------------------
// NotifierPolicy
// ---------------------------------------------------------------------------

/// Throttling parameters of a [`ListenerNotifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierPolicy {
    /// Upper bound on the `count` of any single `Appended` notification.
    /// Bursts at least this large are flushed immediately, in chunks.
    pub max_batch_size: usize,

    /// Minimum time between two notifications for bursts smaller than
    /// `max_batch_size`. Smaller bursts are coalesced until it has elapsed.
    pub min_interval: Duration,
}

impl Default for NotifierPolicy {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            min_interval: Duration::from_millis(10),
        }
    }
}

impl NotifierPolicy {
    pub fn new(max_batch_size: usize, min_interval: Duration) -> Result<Self, LiveLogError> {
        let policy = Self {
            max_batch_size,
            min_interval,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), LiveLogError> {
        if self.max_batch_size == 0 {
            return Err(LiveLogError::InvalidBatchSize(self.max_batch_size));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ListenerNotifier
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct NotifierState {
    /// Entries this listener has been told about.
    last_reported: usize,
    last_flush: Instant,
    /// Set after a `Reset`, cleared by the next `Appended`.
    in_reset: bool,
}

/// Turns the observed entry count of a source (plus explicit removals) into
/// the minimal, throttled stream of [`Modification`]s one listener receives.
///
/// A notifier is driven by a single caller, normally the source's own
/// mutation or polling path. Calls are processed in order; concurrent callers
/// must be serialized by the owner. Notifications are computed under the
/// notifier's lock and delivered after it is released.
///
/// A `Reset` is delivered on construction so every listener starts from a
/// known-empty state.
pub struct ListenerNotifier {
    source: SourceId,
    listener: Arc<dyn LogSourceListener>,
    policy: NotifierPolicy,
    state: Mutex<NotifierState>,
}

impl ListenerNotifier {
    pub fn new(
        source: SourceId,
        listener: Arc<dyn LogSourceListener>,
        policy: NotifierPolicy,
    ) -> Result<Self, LiveLogError> {
        policy.validate()?;
        Ok(Self::start(source, listener, policy))
    }

    /// Build a notifier around an already validated policy.
    pub(crate) fn start(source: SourceId, listener: Arc<dyn LogSourceListener>, policy: NotifierPolicy) -> Self {
        let notifier = Self {
            source,
            listener,
            policy,
            state: Mutex::new(NotifierState {
                last_reported: 0,
                last_flush: Instant::now(),
                in_reset: false,
            }),
        };
        notifier.on_reset();
        notifier
    }

    pub fn policy(&self) -> NotifierPolicy {
        self.policy
    }

    /// Number of entries the listener currently knows about.
    pub fn last_reported_count(&self) -> usize {
        self.state.lock().last_reported
    }

    /// The source now holds `total` entries.
    ///
    /// Bursts of `max_batch_size` or more are reported right away in chunks
    /// of exactly `max_batch_size`; a smaller remainder is only reported once
    /// `min_interval` has passed since the last notification. An unreported
    /// remainder needs no buffering: it is recomputed from the last reported
    /// count on the next call.
    ///
    /// A pending reset only ends once an `Appended` is actually emitted. A
    /// count that is observed but held back by the throttle keeps it pending,
    /// so a second reset right after is still collapsed.
    pub fn on_count_observed(&self, total: usize) {
        let pending = {
            let mut state = self.state.lock();
            let mut pending = Vec::new();

            let mut delta = total.saturating_sub(state.last_reported);
            while delta >= self.policy.max_batch_size {
                pending.push(Modification::appended(state.last_reported, self.policy.max_batch_size));
                state.last_reported += self.policy.max_batch_size;
                delta -= self.policy.max_batch_size;
                state.last_flush = Instant::now();
            }

            if delta > 0 && state.last_flush.elapsed() >= self.policy.min_interval {
                pending.push(Modification::appended(state.last_reported, delta));
                state.last_reported += delta;
                state.last_flush = Instant::now();
            }

            if !pending.is_empty() {
                state.in_reset = false;
            }
            pending
        };

        self.deliver(pending);
    }

    /// The source reset itself: everything reported so far is gone.
    ///
    /// Consecutive resets collapse into one notification as long as nothing
    /// was appended in between.
    pub fn on_reset(&self) {
        {
            let mut state = self.state.lock();
            if state.in_reset {
                return;
            }
            state.last_reported = 0;
            state.in_reset = true;
            state.last_flush = Instant::now();
        }

        self.deliver(vec![Modification::Reset]);
    }

    /// Entries from `from` onward were removed from the source.
    ///
    /// The notification is clamped to what this listener was actually told:
    /// it reports `Removed(from, last_reported - from)` regardless of
    /// `removed_count`, and nothing at all when `from` lies beyond the
    /// reported range.
    pub fn on_removed_from(&self, from: usize, removed_count: usize) {
        let modification = {
            let mut state = self.state.lock();
            if from >= state.last_reported {
                trace!(
                    source = %self.source,
                    from,
                    removed_count,
                    last_reported = state.last_reported,
                    "removal lies beyond reported range"
                );
                return;
            }
            let known = state.last_reported - from;
            state.last_reported = from;
            Modification::removed(from, known)
        };

        self.deliver(vec![modification]);
    }

    fn deliver(&self, modifications: Vec<Modification>) {
        for modification in modifications {
            trace!(source = %self.source, %modification, "notify");
            self.listener.on_modified(self.source, modification);
        }
    }
}
