use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::panic_message;

use super::{next_scheduler_id, Job, PeriodicCallback, PeriodicTask, PeriodicTaskHandle, Scheduler};

/// A [`Scheduler`] that never runs anything on its own.
///
/// One-shot jobs run inline on the calling thread. Periodic tasks run, once
/// each and regardless of their interval, whenever [`run_once`] is called.
///
/// [`run_once`]: ManualScheduler::run_once
pub struct ManualScheduler {
    id: u64,
    tasks: Mutex<Vec<Arc<PeriodicTask>>>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            id: next_scheduler_id(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Invoke every registered periodic task once, in registration order.
    pub fn run_once(&self) {
        let tasks: Vec<Arc<PeriodicTask>> = self.tasks.lock().clone();
        for task in tasks {
            if !task.is_removed() {
                task.run();
            }
        }
    }

    /// [`run_once`](ManualScheduler::run_once), `n` times.
    pub fn run(&self, n: usize) {
        for _ in 0..n {
            self.run_once();
        }
    }

    fn register(&self, task: PeriodicTask) -> PeriodicTaskHandle {
        let task = Arc::new(task);
        debug!(task = %task, "starting manual periodic task");
        self.tasks.lock().push(Arc::clone(&task));
        PeriodicTaskHandle::new(task)
    }
}

impl Scheduler for ManualScheduler {
    fn execute(&self, job: Job) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            error!(panic = %panic_message(&*payload), "job panicked");
        }
    }

    fn start_periodic(
        &self,
        callback: Box<dyn FnMut() + Send>,
        min_interval: Duration,
        name: Option<&str>,
    ) -> PeriodicTaskHandle {
        self.register(PeriodicTask::new(self.id, PeriodicCallback::Fixed(callback), min_interval, name))
    }

    fn start_adaptive(
        &self,
        callback: Box<dyn FnMut() -> Duration + Send>,
        name: Option<&str>,
    ) -> PeriodicTaskHandle {
        self.register(PeriodicTask::new(self.id, PeriodicCallback::Adaptive(callback), Duration::ZERO, name))
    }

    fn remove_periodic(&self, task: &PeriodicTaskHandle) -> bool {
        if task.task().owner() != self.id {
            return false;
        }
        let mut tasks = self.tasks.lock();
        if !task.task().mark_removed() {
            return false;
        }
        tasks.retain(|t| !Arc::ptr_eq(t, task.task()));
        true
    }

    fn periodic_task_count(&self) -> usize {
        self.tasks.lock().len()
    }
}
