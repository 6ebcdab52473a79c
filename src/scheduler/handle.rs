use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::error::{panic_message, LiveLogError};

type Continuation = Box<dyn FnOnce() + Send>;

struct Slot<T> {
    outcome: Option<Result<T, LiveLogError>>,
    finished: bool,
    continuations: Vec<Continuation>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

/// The eventual result of one-shot work started on a scheduler.
///
/// A panic inside the work resolves the handle to
/// [`LiveLogError::TaskPanicked`]; it never propagates to the thread that
/// waits on the handle. Dropping the handle does not cancel the work.
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

/// The producing side of a [`TaskHandle`]. Dropped without completing (the
/// job never ran), it resolves the handle to `SchedulerShutdown`.
pub(crate) struct Completer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub(crate) fn pair() -> (Completer<T>, TaskHandle<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                outcome: None,
                finished: false,
                continuations: Vec::new(),
            }),
            done: Condvar::new(),
        });
        (
            Completer {
                shared: Arc::clone(&shared),
            },
            TaskHandle { shared },
        )
    }

    /// Whether the work has finished (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.shared.slot.lock().finished
    }

    /// Block until the work has finished and return its result.
    pub fn wait(self) -> Result<T, LiveLogError> {
        let mut slot = self.shared.slot.lock();
        while !slot.finished {
            self.shared.done.wait(&mut slot);
        }
        slot.outcome
            .take()
            .unwrap_or_else(|| Err(LiveLogError::TaskPanicked("result already taken".into())))
    }

    /// Block for at most `timeout`. Returns `true` if the work has finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        while !slot.finished {
            if self.shared.done.wait_until(&mut slot, deadline).timed_out() {
                return slot.finished;
            }
        }
        true
    }

    /// Run `continuation` once the work has finished.
    ///
    /// Runs on the worker that finished the work, or right away on the
    /// calling thread if it already has. A panicking continuation is logged.
    pub fn then(&self, continuation: impl FnOnce() + Send + 'static) {
        {
            let mut slot = self.shared.slot.lock();
            if !slot.finished {
                slot.continuations.push(Box::new(continuation));
                return;
            }
        }
        run_continuation(Box::new(continuation));
    }
}

impl<T> Completer<T> {
    pub(crate) fn complete(self, outcome: Result<T, LiveLogError>) {
        self.resolve(outcome);
    }

    fn resolve(&self, outcome: Result<T, LiveLogError>) {
        let continuations = {
            let mut slot = self.shared.slot.lock();
            if slot.finished {
                return;
            }
            slot.outcome = Some(outcome);
            slot.finished = true;
            std::mem::take(&mut slot.continuations)
        };
        self.shared.done.notify_all();
        for continuation in continuations {
            run_continuation(continuation);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.resolve(Err(LiveLogError::SchedulerShutdown));
    }
}

fn run_continuation(continuation: Continuation) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(continuation)) {
        error!(panic = %panic_message(&*payload), "task continuation panicked");
    }
}
