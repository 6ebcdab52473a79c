use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::engine::LogSourceSearch;
use crate::error::LiveLogError;
use crate::listeners::{ListenerToken, SearchListenerCollection};
use crate::notifier::NotifierPolicy;
use crate::results::LogMatch;
use crate::scheduler::Scheduler;
use crate::traits::{LogSource, SearchId, SearchListener};

struct ProxyState {
    current: Option<Arc<LogSourceSearch>>,
    relay: Option<ListenerToken>,
    /// Bumped on every replacement; results of older generations are stale.
    generation: u64,
    /// Term the current search was built from by `set_search_term`.
    term: Option<String>,
}

/// Everything needed to build a search from a bare term.
struct SearchFactory {
    source: Arc<dyn LogSource>,
    scheduler: Arc<dyn Scheduler>,
    policy: NotifierPolicy,
}

impl SearchFactory {
    fn start(&self, term: &str) -> Result<LogSourceSearch, LiveLogError> {
        crate::search()
            .shared_source(Arc::clone(&self.source))
            .matching(term)
            .max_batch_size(self.policy.max_batch_size)
            .max_wait(self.policy.min_interval)
            .start(Arc::clone(&self.scheduler))
    }
}

struct ProxyInner {
    id: SearchId,
    state: Mutex<ProxyState>,
    listeners: SearchListenerCollection,
    factory: Option<SearchFactory>,
}

impl ProxyInner {
    fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

/// Forwards the results of the proxy's current inner search.
struct ProxyRelay {
    proxy: Weak<ProxyInner>,
    expected: SearchId,
    generation: u64,
}

impl SearchListener for ProxyRelay {
    fn on_search_modified(&self, search: SearchId, matches: &[LogMatch]) {
        if search != self.expected {
            return;
        }
        let Some(proxy) = self.proxy.upgrade() else {
            return;
        };

        let published = proxy.listeners.publish_if(Arc::new(matches.to_vec()), |current| {
            current != matches && proxy.generation() == self.generation
        });
        if !published {
            trace!(proxy = %proxy.id, %search, "relayed matches dropped");
        }
    }
}

/// A stable search handle whose underlying [`LogSourceSearch`] can be swapped.
///
/// Listeners of the proxy see the current inner search's matches. Replacing
/// the inner search publishes the new search's current matches straight
/// away, so listeners never observe an empty list in between; results of the
/// replaced search are ignored from then on. Without an inner search the
/// proxy reports no matches.
///
/// No lock of the proxy is held while its listeners run; they may query the
/// proxy from within their callback.
pub struct SearchProxy {
    inner: Arc<ProxyInner>,
}

impl Default for SearchProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchProxy {
    /// A proxy without an inner search.
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_inner(search: Arc<LogSourceSearch>) -> Self {
        let proxy = Self::new();
        proxy.set_inner(Some(search));
        proxy
    }

    /// A proxy that builds its own inner searches over `source`, see
    /// [`set_search_term`](SearchProxy::set_search_term).
    pub fn for_source(source: Arc<dyn LogSource>, scheduler: Arc<dyn Scheduler>, policy: NotifierPolicy) -> Self {
        Self::build(Some(SearchFactory {
            source,
            scheduler,
            policy,
        }))
    }

    fn build(factory: Option<SearchFactory>) -> Self {
        let id = SearchId::next();
        Self {
            inner: Arc::new(ProxyInner {
                id,
                state: Mutex::new(ProxyState {
                    current: None,
                    relay: None,
                    generation: 0,
                    term: None,
                }),
                listeners: SearchListenerCollection::new(id),
                factory,
            }),
        }
    }

    pub fn id(&self) -> SearchId {
        self.inner.id
    }

    pub fn inner(&self) -> Option<Arc<LogSourceSearch>> {
        self.inner.state.lock().current.clone()
    }

    /// The term last passed to [`set_search_term`](SearchProxy::set_search_term),
    /// unless the inner search was replaced by hand since.
    pub fn search_term(&self) -> Option<String> {
        self.inner.state.lock().term.clone()
    }

    /// Search the proxy's source for `term` instead.
    ///
    /// Starts a new inner search and detaches the replaced one. An empty term
    /// clears the inner search. Setting the current term again does nothing.
    ///
    /// # Errors
    ///
    /// [`LiveLogError::MissingSource`] if the proxy was not created through
    /// [`for_source`](SearchProxy::for_source); otherwise whatever starting
    /// the search fails with. The inner search is left alone on error.
    pub fn set_search_term(&self, term: &str) -> Result<(), LiveLogError> {
        let factory = self.inner.factory.as_ref().ok_or(LiveLogError::MissingSource)?;
        if self.inner.state.lock().term.as_deref() == Some(term) {
            return Ok(());
        }

        let search = if term.is_empty() {
            None
        } else {
            Some(Arc::new(factory.start(term)?))
        };

        let previous = self.replace(search, Some(term.to_owned()));
        if let Some(previous) = previous {
            previous.detach();
        }
        Ok(())
    }

    /// Replace the inner search and return the previous one.
    pub fn set_inner(&self, search: Option<Arc<LogSourceSearch>>) -> Option<Arc<LogSourceSearch>> {
        self.replace(search, None)
    }

    fn replace(&self, search: Option<Arc<LogSourceSearch>>, term: Option<String>) -> Option<Arc<LogSourceSearch>> {
        let (previous, stale_relay, matches, generation) = {
            let mut state = self.inner.state.lock();
            let previous = std::mem::replace(&mut state.current, search.clone());
            state.generation += 1;
            state.term = term;
            let matches = search.as_ref().map(|s| s.matches()).unwrap_or_default();
            (previous, state.relay.take(), matches, state.generation)
        };

        if let (Some(previous), Some(token)) = (&previous, stale_relay) {
            previous.remove_listener(token);
        }
        self.inner
            .listeners
            .publish_if(matches, |_| self.inner.generation() == generation);

        debug!(
            proxy = %self.inner.id,
            previous = ?previous.as_ref().map(|s| s.id()),
            current = ?search.as_ref().map(|s| s.id()),
            "inner search replaced"
        );

        if let Some(search) = search {
            let relay = Arc::new(ProxyRelay {
                proxy: Arc::downgrade(&self.inner),
                expected: search.id(),
                generation,
            });
            let token = search.add_listener(relay);

            let mut state = self.inner.state.lock();
            if state.generation == generation && state.relay.is_none() {
                state.relay = Some(token);
            } else {
                drop(state);
                search.remove_listener(token);
            }
        }

        previous
    }

    /// The matches last published to this proxy's listeners.
    pub fn matches(&self) -> Arc<Vec<LogMatch>> {
        self.inner.listeners.current()
    }

    pub fn count(&self) -> usize {
        self.matches().len()
    }

    /// Subscribe `listener`. It is told the current matches right away.
    pub fn add_listener(&self, listener: Arc<dyn SearchListener>) -> ListenerToken {
        self.inner.listeners.add_listener(listener)
    }

    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        self.inner.listeners.remove_listener(token)
    }
}

impl Drop for SearchProxy {
    fn drop(&mut self) {
        let (current, relay, owned) = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            (state.current.take(), state.relay.take(), state.term.is_some())
        };
        let Some(current) = current else {
            return;
        };
        if let Some(token) = relay {
            current.remove_listener(token);
        }
        // Searches built from a term belong to the proxy.
        if owned {
            current.detach();
        }
    }
}
