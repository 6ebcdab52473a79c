#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use livelog::{LogMatch, LogSourceListener, Modification, SearchId, SearchListener, SourceId};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Route library logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("livelog=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Recording listeners
// ---------------------------------------------------------------------------

/// Records every modification it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(SourceId, Modification)>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn modifications(&self) -> Vec<Modification> {
        self.events.lock().iter().map(|(_, m)| *m).collect()
    }

    pub fn sources(&self) -> Vec<SourceId> {
        self.events.lock().iter().map(|(s, _)| *s).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl LogSourceListener for RecordingListener {
    fn on_modified(&self, source: SourceId, modification: Modification) {
        self.events.lock().push((source, modification));
    }
}

/// Records every match list it is told about.
#[derive(Default)]
pub struct RecordingSearchListener {
    lists: Mutex<Vec<(SearchId, Vec<LogMatch>)>>,
}

impl RecordingSearchListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lists(&self) -> Vec<Vec<LogMatch>> {
        self.lists.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn searches(&self) -> Vec<SearchId> {
        self.lists.lock().iter().map(|(s, _)| *s).collect()
    }

    pub fn last(&self) -> Option<Vec<LogMatch>> {
        self.lists.lock().last().map(|(_, l)| l.clone())
    }

    pub fn len(&self) -> usize {
        self.lists.lock().len()
    }
}

impl SearchListener for RecordingSearchListener {
    fn on_search_modified(&self, search: SearchId, matches: &[LogMatch]) {
        self.lists.lock().push((search, matches.to_vec()));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Match starting at `start` with `length` bytes, in entry `index`.
pub fn hit(index: usize, start: usize, length: usize) -> LogMatch {
    LogMatch::new(index, livelog::MatchSpan::new(start, length))
}
