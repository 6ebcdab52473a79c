use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, trace};

use crate::error::{panic_message, LiveLogError};

/// A unit of work executed once on a worker thread.
pub type Job = Box<dyn FnOnce() + Send>;

/// A fixed set of named worker threads draining one shared job queue.
///
/// A panicking job is logged and does not take its worker down. Workers exit
/// once the pool is dropped and the queue has drained; dropping does not wait
/// for them.
pub(crate) struct WorkerPool {
    jobs: Sender<Job>,
    workers: usize,
}

impl WorkerPool {
    pub(crate) fn new(name: &str, workers: usize) -> Result<Self, LiveLogError> {
        if workers == 0 {
            return Err(LiveLogError::InvalidThreadCount(workers));
        }

        let (jobs, queue) = unbounded::<Job>();
        for i in 0..workers {
            let queue: Receiver<Job> = queue.clone();
            thread::Builder::new()
                .name(format!("{name}-worker-{i}"))
                .spawn(move || {
                    for job in queue.iter() {
                        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                            error!(panic = %panic_message(&*payload), "job panicked");
                        }
                    }
                    trace!("worker exiting");
                })
                .map_err(LiveLogError::ThreadSpawn)?;
        }
        debug!(pool = name, workers, "worker pool started");

        Ok(Self { jobs, workers })
    }

    pub(crate) fn execute(&self, job: Job) {
        // Receivers live as long as their worker threads, which only exit
        // after this sender is dropped.
        if self.jobs.send(job).is_err() {
            trace!("worker pool gone, job dropped");
        }
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }
}

/// Logical CPU count, with a safe fallback.
pub(crate) fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .max(2)
}
