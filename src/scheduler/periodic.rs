use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::error::panic_message;

pub(crate) enum PeriodicCallback {
    /// Re-invoked no more often than a fixed interval.
    Fixed(Box<dyn FnMut() + Send>),
    /// Returns the minimum wait before its next invocation.
    Adaptive(Box<dyn FnMut() -> Duration + Send>),
}

#[derive(Debug)]
struct Timing {
    min_interval: Duration,
    last_invocation: Option<Instant>,
}

/// A callback re-invoked by a scheduler until removed.
///
/// Lives in exactly one scheduler. Its invocations never overlap: the driver
/// takes it out of the pending set before dispatch and only puts it back once
/// the body returned.
pub(crate) struct PeriodicTask {
    id: u64,
    owner: u64,
    name: Option<String>,
    callback: Mutex<PeriodicCallback>,
    timing: Mutex<Timing>,
    removed: AtomicBool,
}

impl PeriodicTask {
    pub(crate) fn new(owner: u64, callback: PeriodicCallback, min_interval: Duration, name: Option<&str>) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            owner,
            name: name.map(str::to_owned),
            callback: Mutex::new(callback),
            timing: Mutex::new(Timing {
                min_interval,
                last_invocation: None,
            }),
            removed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Flag the task as removed. Returns `true` if it was still registered.
    pub(crate) fn mark_removed(&self) -> bool {
        !self.removed.swap(true, Ordering::AcqRel)
    }

    /// Time left until the task may run again; zero when it is due.
    pub(crate) fn remaining(&self, now: Instant) -> Duration {
        let timing = self.timing.lock();
        match timing.last_invocation {
            None => Duration::ZERO,
            Some(last) => timing
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Invoke the callback once. A panic is logged and swallowed.
    pub(crate) fn run(&self) {
        self.timing.lock().last_invocation = Some(Instant::now());

        let mut callback = self.callback.lock();
        let outcome = catch_unwind(AssertUnwindSafe(|| match &mut *callback {
            PeriodicCallback::Fixed(f) => {
                f();
                None
            }
            PeriodicCallback::Adaptive(f) => Some(f()),
        }));
        drop(callback);

        match outcome {
            Ok(Some(next)) => self.timing.lock().min_interval = next,
            Ok(None) => {}
            Err(payload) => {
                error!(task = %self, panic = %panic_message(&*payload), "periodic task panicked");
            }
        }
        trace!(task = %self, "periodic task invoked");
    }
}

impl fmt::Display for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "#{} ({name})", self.id),
            None => write!(f, "#{}", self.id),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

/// The pending set of a scheduler plus every registered task.
///
/// Tasks that are currently running are registered but not pending.
#[derive(Default)]
pub(crate) struct TaskQueue {
    pending: Vec<Arc<PeriodicTask>>,
    registered: Vec<Arc<PeriodicTask>>,
}

impl TaskQueue {
    pub(crate) fn add(&mut self, task: Arc<PeriodicTask>) {
        self.registered.push(Arc::clone(&task));
        self.pending.push(task);
    }

    /// Unregister `task`. Returns `false` if it had already been removed.
    pub(crate) fn remove(&mut self, task: &Arc<PeriodicTask>) -> bool {
        if !task.mark_removed() {
            return false;
        }
        self.registered.retain(|t| !Arc::ptr_eq(t, task));
        self.pending.retain(|t| !Arc::ptr_eq(t, task));
        true
    }

    /// Put a task back after its body returned, unless it was removed meanwhile.
    pub(crate) fn requeue(&mut self, task: Arc<PeriodicTask>) -> bool {
        if task.is_removed() {
            return false;
        }
        self.pending.push(task);
        true
    }

    /// Take every task that is due at `now` out of the pending set.
    ///
    /// Also returns the smallest wait among the tasks left behind, or `None`
    /// when nothing is pending.
    pub(crate) fn take_due(&mut self, now: Instant) -> (Vec<Arc<PeriodicTask>>, Option<Duration>) {
        let mut due = Vec::new();
        let mut min_wait: Option<Duration> = None;

        self.pending.retain(|task| {
            let remaining = task.remaining(now);
            if remaining.is_zero() {
                due.push(Arc::clone(task));
                false
            } else {
                min_wait = Some(min_wait.map_or(remaining, |w| w.min(remaining)));
                true
            }
        });

        (due, min_wait)
    }

    /// Unregister every task, including the ones currently running.
    pub(crate) fn clear(&mut self) -> usize {
        self.pending.clear();
        let registered = std::mem::take(&mut self.registered);
        for task in &registered {
            task.mark_removed();
        }
        registered.len()
    }

    pub(crate) fn registered(&self) -> usize {
        self.registered.len()
    }
}
