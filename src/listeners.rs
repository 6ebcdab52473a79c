use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, warn};

use crate::notifier::{ListenerNotifier, NotifierPolicy};
use crate::results::LogMatch;
use crate::traits::{LogSourceListener, SearchId, SearchListener, SourceId};

/// Returned when subscribing a listener; hand it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(u64);

impl ListenerToken {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ListenerCollection
// ---------------------------------------------------------------------------

/// The listeners of one [`LogSource`](crate::LogSource), each behind its own
/// [`ListenerNotifier`].
///
/// Sources forward every count observation, removal and reset here; the
/// collection fans them out to every notifier. The listener list lock is
/// released before any listener is invoked.
pub struct ListenerCollection {
    source: SourceId,
    notifiers: Mutex<Vec<(ListenerToken, Arc<ListenerNotifier>)>>,
}

impl ListenerCollection {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            notifiers: Mutex::new(Vec::new()),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Subscribe `listener`, which immediately receives a `Reset`.
    ///
    /// An invalid `policy` falls back to [`NotifierPolicy::default`] rather
    /// than failing, as sources cannot reject listeners.
    pub fn add_listener(&self, listener: Arc<dyn LogSourceListener>, policy: NotifierPolicy) -> ListenerToken {
        let policy = match policy.validate() {
            Ok(()) => policy,
            Err(e) => {
                warn!(source = %self.source, error = %e, "invalid notifier policy, using default");
                NotifierPolicy::default()
            }
        };

        let notifier = Arc::new(ListenerNotifier::start(self.source, listener, policy));

        let token = ListenerToken::next();
        self.notifiers.lock().push((token, notifier));
        debug!(source = %self.source, %token, ?policy, "listener added");
        token
    }

    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        let mut notifiers = self.notifiers.lock();
        let before = notifiers.len();
        notifiers.retain(|(t, _)| *t != token);
        let removed = notifiers.len() != before;
        if removed {
            debug!(source = %self.source, %token, "listener removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.notifiers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.lock().is_empty()
    }

    /// The source now holds `total` entries.
    pub fn on_count_observed(&self, total: usize) {
        for notifier in self.snapshot() {
            notifier.on_count_observed(total);
        }
    }

    /// The source reset itself.
    pub fn on_reset(&self) {
        for notifier in self.snapshot() {
            notifier.on_reset();
        }
    }

    /// Entries from `from` onward were removed.
    pub fn on_removed_from(&self, from: usize, removed_count: usize) {
        for notifier in self.snapshot() {
            notifier.on_removed_from(from, removed_count);
        }
    }

    fn snapshot(&self) -> Vec<Arc<ListenerNotifier>> {
        self.notifiers.lock().iter().map(|(_, n)| Arc::clone(n)).collect()
    }
}

// ---------------------------------------------------------------------------
// SearchListenerCollection
// ---------------------------------------------------------------------------

struct SearchListeners {
    listeners: Vec<(ListenerToken, Arc<dyn SearchListener>)>,
    current: Arc<Vec<LogMatch>>,
}

/// Listeners of a search, together with the match list they were last told.
///
/// New listeners are told the current matches at once. Emissions and the
/// initial notification of a new listener are serialized across threads, so
/// no listener ever sees an older list after a newer one. The serializing
/// lock is re-entrant: a listener may query the search, subscribe or
/// unsubscribe from within its callback. A list published from within a
/// callback supersedes the one being delivered, whose remaining deliveries
/// are skipped.
pub(crate) struct SearchListenerCollection {
    search: SearchId,
    state: Mutex<SearchListeners>,
    emitting: ReentrantMutex<()>,
}

impl SearchListenerCollection {
    pub(crate) fn new(search: SearchId) -> Self {
        Self {
            search,
            state: Mutex::new(SearchListeners {
                listeners: Vec::new(),
                current: Arc::new(Vec::new()),
            }),
            emitting: ReentrantMutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> Arc<Vec<LogMatch>> {
        Arc::clone(&self.state.lock().current)
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn SearchListener>) -> ListenerToken {
        let _emitting = self.emitting.lock();
        let token = ListenerToken::next();
        let current = {
            let mut state = self.state.lock();
            state.listeners.push((token, Arc::clone(&listener)));
            Arc::clone(&state.current)
        };
        listener.on_search_modified(self.search, &current);
        token
    }

    pub(crate) fn remove_listener(&self, token: ListenerToken) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(t, _)| *t != token);
        state.listeners.len() != before
    }

    /// Replace the current match list and tell every listener.
    pub(crate) fn publish(&self, matches: Arc<Vec<LogMatch>>) {
        self.publish_if(matches, |_| true);
    }

    /// Like [`publish`](Self::publish), but only if `accept` approves of the
    /// replacement. `accept` sees the current list and runs serialized with
    /// every other emission. Returns whether the list was published.
    pub(crate) fn publish_if(
        &self,
        matches: Arc<Vec<LogMatch>>,
        accept: impl FnOnce(&[LogMatch]) -> bool,
    ) -> bool {
        let _emitting = self.emitting.lock();
        let listeners: Vec<Arc<dyn SearchListener>> = {
            let mut state = self.state.lock();
            if !accept(&state.current) {
                return false;
            }
            state.current = Arc::clone(&matches);
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            if !Arc::ptr_eq(&self.state.lock().current, &matches) {
                // Superseded by a list published from within a callback.
                break;
            }
            listener.on_search_modified(self.search, &matches);
        }
        true
    }
}
