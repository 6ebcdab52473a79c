use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{ReentrantMutex, RwLock};
use tracing::debug;

use crate::entry::{LevelFlags, LogEntry};
use crate::error::LiveLogError;
use crate::listeners::{ListenerCollection, ListenerToken};
use crate::modification::Section;
use crate::notifier::NotifierPolicy;
use crate::scheduler::{PeriodicTaskHandle, Scheduler};
use crate::traits::{LogSource, LogSourceListener, SourceId};

struct MemoryInner {
    id: SourceId,
    records: RwLock<Vec<LogEntry>>,
    listeners: ListenerCollection,
    /// Serializes mutations together with their notifications. Re-entrant so
    /// a listener may mutate the source from within its callback.
    writer: ReentrantMutex<()>,
}

/// A [`LogSource`] backed by a vector, mutated explicitly.
///
/// Cheap to clone; clones share the same entries and listeners. Every
/// mutation notifies listeners before returning, in mutation order. Small
/// appends may be held back by a listener's throttle; [`poll`] (or
/// [`start_polling`]) re-reports the count so they are flushed eventually.
///
/// Listeners may read or mutate the source from within their callback. A
/// mutation made there is notified on the spot, nested inside the callback.
///
/// [`poll`]: InMemoryLogSource::poll
/// [`start_polling`]: InMemoryLogSource::start_polling
#[derive(Clone)]
pub struct InMemoryLogSource {
    inner: Arc<MemoryInner>,
}

impl Default for InMemoryLogSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogSource {
    pub fn new() -> Self {
        let id = SourceId::next();
        Self {
            inner: Arc::new(MemoryInner {
                id,
                records: RwLock::new(Vec::new()),
                listeners: ListenerCollection::new(id),
                writer: ReentrantMutex::new(()),
            }),
        }
    }

    /// Append one entry and return its index.
    pub fn add_entry(&self, content: impl Into<String>, level: LevelFlags) -> usize {
        let _writer = self.inner.writer.lock();
        let (index, total) = {
            let mut records = self.inner.records.write();
            let index = records.len();
            records.push(LogEntry::new(index, content, level));
            (index, records.len())
        };
        self.inner.listeners.on_count_observed(total);
        index
    }

    /// Append several entries at once; listeners see a single count change.
    pub fn add_entries<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = (S, LevelFlags)>,
        S: Into<String>,
    {
        let _writer = self.inner.writer.lock();
        let total = {
            let mut records = self.inner.records.write();
            for (content, level) in entries {
                let index = records.len();
                records.push(LogEntry::new(index, content, level));
            }
            records.len()
        };
        self.inner.listeners.on_count_observed(total);
    }

    /// Drop every entry from `index` onward. Returns how many were removed.
    pub fn remove_from(&self, index: usize) -> usize {
        let _writer = self.inner.writer.lock();
        let removed = {
            let mut records = self.inner.records.write();
            let removed = records.len().saturating_sub(index);
            records.truncate(index);
            removed
        };
        if removed > 0 {
            debug!(source = %self.inner.id, index, removed, "entries removed");
            self.inner.listeners.on_removed_from(index, removed);
        }
        removed
    }

    /// Drop every entry and reset all listeners.
    pub fn clear(&self) {
        let _writer = self.inner.writer.lock();
        self.inner.records.write().clear();
        debug!(source = %self.inner.id, "source cleared");
        self.inner.listeners.on_reset();
    }

    /// Re-report the current count, flushing appends held back by throttling.
    pub fn poll(&self) {
        self.inner.poll();
    }

    /// Call [`poll`](InMemoryLogSource::poll) every `interval` on `scheduler`.
    ///
    /// The task does not keep the source alive; it idles once every clone has
    /// been dropped. Remove it through the scheduler to stop polling.
    pub fn start_polling(&self, scheduler: &dyn Scheduler, interval: Duration) -> PeriodicTaskHandle {
        let inner: Weak<MemoryInner> = Arc::downgrade(&self.inner);
        scheduler.start_periodic(
            Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.poll();
                }
            }),
            interval,
            Some("in-memory source poll"),
        )
    }

    /// Number of subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl MemoryInner {
    fn poll(&self) {
        let _writer = self.writer.lock();
        let total = self.records.read().len();
        self.listeners.on_count_observed(total);
    }
}

impl LogSource for InMemoryLogSource {
    fn id(&self) -> SourceId {
        self.inner.id
    }

    fn count(&self) -> usize {
        self.inner.records.read().len()
    }

    fn fetch(&self, section: Section) -> Result<Vec<LogEntry>, LiveLogError> {
        let records = self.inner.records.read();
        records
            .get(section.index..section.end())
            .map(<[LogEntry]>::to_vec)
            .ok_or(LiveLogError::OutOfRange {
                section,
                count: records.len(),
            })
    }

    /// The new listener is reset, then told about the entries already present
    /// (subject to its throttle).
    fn add_listener(&self, listener: Arc<dyn LogSourceListener>, policy: NotifierPolicy) -> ListenerToken {
        let _writer = self.inner.writer.lock();
        let token = self.inner.listeners.add_listener(listener, policy);
        let total = self.inner.records.read().len();
        self.inner.listeners.on_count_observed(total);
        token
    }

    fn remove_listener(&self, token: ListenerToken) -> bool {
        self.inner.listeners.remove_listener(token)
    }
}
