//! Periodic and one-shot task scheduling.
//!
//! [`TaskScheduler`] owns one driver thread and a worker pool. The driver
//! dispatches every due periodic task to the pool, then sleeps until the next
//! one is due, a task is added, or the scheduler shuts down. A task is only
//! put back into the pending set after its body returned, so invocations of
//! one task never overlap, and a task removed meanwhile is simply dropped.
//!
//! [`ManualScheduler`] implements the same [`Scheduler`] trait but runs
//! periodic tasks only when told to, for deterministic tests and embedders
//! that drive their own loop.

mod handle;
mod manual;
mod periodic;
mod pool;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{panic_message, LiveLogError};

pub use handle::TaskHandle;
pub use manual::ManualScheduler;
pub use pool::Job;

pub(crate) use periodic::{PeriodicCallback, PeriodicTask, TaskQueue};
use pool::{default_workers, WorkerPool};

/// Upper bound on the driver's sleep when no periodic task is pending.
const IDLE_WAIT: Duration = Duration::from_secs(60);

pub(crate) fn next_scheduler_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Scheduler contract
// ---------------------------------------------------------------------------

/// Runs one-shot jobs and periodic tasks.
///
/// Object-safe so components can hold an `Arc<dyn Scheduler>`; the typed
/// conveniences live on [`SchedulerExt`].
pub trait Scheduler: Send + Sync {
    /// Run `job` once, asynchronously.
    fn execute(&self, job: Job);

    /// Invoke `callback` repeatedly, never more often than `min_interval`
    /// apart, until the returned task is removed.
    ///
    /// A panicking invocation is logged; it neither unregisters the task nor
    /// stops later invocations.
    fn start_periodic(
        &self,
        callback: Box<dyn FnMut() + Send>,
        min_interval: Duration,
        name: Option<&str>,
    ) -> PeriodicTaskHandle;

    /// Like [`start_periodic`](Scheduler::start_periodic), but each invocation
    /// returns the minimum wait before the next one.
    fn start_adaptive(
        &self,
        callback: Box<dyn FnMut() -> Duration + Send>,
        name: Option<&str>,
    ) -> PeriodicTaskHandle;

    /// Stop scheduling `task`. Returns whether it was still registered.
    ///
    /// Idempotent and safe while the task is running: the current invocation
    /// completes, no further one starts.
    fn remove_periodic(&self, task: &PeriodicTaskHandle) -> bool;

    /// Number of registered periodic tasks.
    fn periodic_task_count(&self) -> usize;
}

/// Typed conveniences over any [`Scheduler`].
pub trait SchedulerExt: Scheduler {
    /// Run `f` once on a worker and hand back its eventual result.
    ///
    /// A panic inside `f` is caught, logged and reported through the handle.
    fn start<F, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (completer, handle) = TaskHandle::pair();
        self.execute(Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                let message = panic_message(&*payload);
                warn!(panic = %message, "one-shot task panicked");
                LiveLogError::TaskPanicked(message)
            });
            completer.complete(outcome);
        }));
        handle
    }

    /// [`start_periodic`](Scheduler::start_periodic) without the boxing.
    fn every<F>(&self, min_interval: Duration, name: &str, f: F) -> PeriodicTaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        self.start_periodic(Box::new(f), min_interval, Some(name))
    }
}

impl<S: Scheduler + ?Sized> SchedulerExt for S {}

/// Identifies a periodic task registered with a scheduler.
///
/// Cloning the handle does not duplicate the task.
#[derive(Clone)]
pub struct PeriodicTaskHandle {
    task: Arc<PeriodicTask>,
}

impl PeriodicTaskHandle {
    pub(crate) fn new(task: Arc<PeriodicTask>) -> Self {
        Self { task }
    }

    pub(crate) fn task(&self) -> &Arc<PeriodicTask> {
        &self.task
    }

    pub fn id(&self) -> u64 {
        self.task.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.task.name()
    }

    /// Whether the task has been removed from its scheduler.
    pub fn is_removed(&self) -> bool {
        self.task.is_removed()
    }
}

impl fmt::Debug for PeriodicTaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTaskHandle")
            .field("id", &self.task.id())
            .field("name", &self.task.name())
            .field("removed", &self.task.is_removed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TaskScheduler
// ---------------------------------------------------------------------------

enum Signal {
    TaskAdded,
    Shutdown,
}

struct SchedulerInner {
    id: u64,
    queue: Mutex<TaskQueue>,
    pool: WorkerPool,
    signals: Sender<Signal>,
    disposed: AtomicBool,
}

impl SchedulerInner {
    fn wake(&self, signal: Signal) {
        // A full channel already holds a wake-up; the driver re-checks
        // `disposed` after every wake-up.
        let _ = self.signals.try_send(signal);
    }

    /// Dispatch every due task; returns how many ran and the wait until the next.
    fn dispatch_due(self: &Arc<Self>) -> (usize, Option<Duration>) {
        let (due, wait) = self.queue.lock().take_due(Instant::now());
        let dispatched = due.len();

        for task in due {
            let inner = Arc::downgrade(self);
            self.pool.execute(Box::new(move || {
                task.run();
                finish(&inner, task);
            }));
        }

        (dispatched, wait)
    }
}

fn finish(inner: &Weak<SchedulerInner>, task: Arc<PeriodicTask>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if inner.disposed.load(Ordering::Acquire) {
        return;
    }
    let requeued = inner.queue.lock().requeue(Arc::clone(&task));
    if requeued {
        inner.wake(Signal::TaskAdded);
    } else {
        debug!(task = %task, "periodic task removed, not rescheduled");
    }
}

/// The threaded [`Scheduler`]: one driver thread plus a worker pool.
///
/// Dropping the scheduler (or calling [`shutdown`](TaskScheduler::shutdown))
/// stops the driver; bodies already running are not waited for.
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
}

impl TaskScheduler {
    /// A scheduler with one worker per logical CPU (at least two).
    pub fn new() -> Result<Self, LiveLogError> {
        Self::with_workers(default_workers())
    }

    /// A scheduler with exactly `workers` worker threads.
    ///
    /// # Errors
    ///
    /// `InvalidThreadCount` for zero workers, `ThreadSpawn` when the OS
    /// refuses to create a thread.
    pub fn with_workers(workers: usize) -> Result<Self, LiveLogError> {
        let pool = WorkerPool::new("livelog", workers)?;
        let (signals, wake_ups) = bounded(1);

        let inner = Arc::new(SchedulerInner {
            id: next_scheduler_id(),
            queue: Mutex::new(TaskQueue::default()),
            pool,
            signals,
            disposed: AtomicBool::new(false),
        });

        let driver = Arc::downgrade(&inner);
        thread::Builder::new()
            .name("livelog-periodic-scheduler".into())
            .spawn(move || drive(driver, wake_ups))
            .map_err(LiveLogError::ThreadSpawn)?;

        debug!(scheduler = inner.id, workers, "task scheduler started");
        Ok(Self { inner })
    }

    pub fn workers(&self) -> usize {
        self.inner.pool.workers()
    }

    /// Stop scheduling. Registered periodic tasks are removed; running bodies
    /// finish on their own.
    pub fn shutdown(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let removed = self.inner.queue.lock().clear();
        self.inner.wake(Signal::Shutdown);
        debug!(scheduler = self.inner.id, removed, "task scheduler shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn register(&self, task: PeriodicTask, interval: Option<Duration>) -> PeriodicTaskHandle {
        let task = Arc::new(task);
        if self.is_shut_down() {
            warn!(task = %task, "scheduler has shut down, periodic task will never run");
            task.mark_removed();
            return PeriodicTaskHandle::new(task);
        }

        match interval {
            Some(interval) => debug!(
                task = %task,
                interval_ms = interval.as_millis() as u64,
                "starting periodic task"
            ),
            None => debug!(task = %task, "starting adaptive periodic task"),
        }

        self.inner.queue.lock().add(Arc::clone(&task));
        self.inner.wake(Signal::TaskAdded);
        PeriodicTaskHandle::new(task)
    }
}

impl Scheduler for TaskScheduler {
    fn execute(&self, job: Job) {
        if self.is_shut_down() {
            warn!("scheduler has shut down, job dropped");
            return;
        }
        self.inner.pool.execute(job);
    }

    fn start_periodic(
        &self,
        callback: Box<dyn FnMut() + Send>,
        min_interval: Duration,
        name: Option<&str>,
    ) -> PeriodicTaskHandle {
        let task = PeriodicTask::new(self.inner.id, PeriodicCallback::Fixed(callback), min_interval, name);
        self.register(task, Some(min_interval))
    }

    fn start_adaptive(
        &self,
        callback: Box<dyn FnMut() -> Duration + Send>,
        name: Option<&str>,
    ) -> PeriodicTaskHandle {
        let task = PeriodicTask::new(self.inner.id, PeriodicCallback::Adaptive(callback), Duration::ZERO, name);
        self.register(task, None)
    }

    fn remove_periodic(&self, task: &PeriodicTaskHandle) -> bool {
        if task.task().owner() != self.inner.id {
            return false;
        }
        let removed = self.inner.queue.lock().remove(task.task());
        if removed {
            debug!(task = %task.task(), "removed periodic task");
        }
        removed
    }

    fn periodic_task_count(&self) -> usize {
        self.inner.queue.lock().registered()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Driver loop: dispatch due tasks, then sleep until the next is due.
fn drive(inner: Weak<SchedulerInner>, wake_ups: Receiver<Signal>) {
    loop {
        let wait = {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if inner.disposed.load(Ordering::Acquire) {
                break;
            }
            let (dispatched, wait) = inner.dispatch_due();
            if dispatched > 0 {
                trace!(scheduler = inner.id, dispatched, "dispatched periodic tasks");
            }
            wait.unwrap_or(IDLE_WAIT)
        };

        match wake_ups.recv_timeout(wait) {
            Ok(Signal::TaskAdded) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("periodic scheduler driver stopped");
}
