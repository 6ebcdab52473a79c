mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use livelog::filter::{LevelFilter, SubstringFilter};
use livelog::{
    InMemoryLogSource, LevelFlags, ListenerToken, LiveLogError, LogMatch, LogSource, LogSourceListener,
    LogSourceSearch, ManualScheduler, Modification, NotifierPolicy, Scheduler, SearchId, SearchListener, SourceId,
    TaskScheduler,
};

use common::{hit, init_tracing, wait_until, RecordingSearchListener};

fn setup() -> (Arc<ManualScheduler>, InMemoryLogSource) {
    init_tracing();
    (Arc::new(ManualScheduler::new()), InMemoryLogSource::new())
}

/// A search that hears about every append immediately.
fn search_for(term: &str, source: &InMemoryLogSource, scheduler: &Arc<ManualScheduler>) -> LogSourceSearch {
    livelog::search()
        .source(source.clone())
        .matching(term)
        .max_wait(Duration::ZERO)
        .start(scheduler.clone())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Incremental matching
// ---------------------------------------------------------------------------

#[test]
fn test_existing_and_appended_entries() {
    let (scheduler, source) = setup();
    source.add_entry("foo", LevelFlags::INFO);
    source.add_entry("bar", LevelFlags::INFO);
    source.add_entry("foobar", LevelFlags::INFO);

    let search = search_for("foo", &source, &scheduler);
    assert_eq!(search.count(), 0);

    scheduler.run_once();
    assert_eq!(search.matches().to_vec(), vec![hit(0, 0, 3), hit(2, 0, 3)]);

    source.add_entry("xfoo", LevelFlags::INFO);
    scheduler.run_once();
    assert_eq!(search.matches().to_vec(), vec![hit(0, 0, 3), hit(2, 0, 3), hit(3, 1, 3)]);
}

#[test]
fn test_every_occurrence_is_a_match() {
    let (scheduler, source) = setup();
    let search = search_for("ab", &source, &scheduler);

    source.add_entry("ab AB ab", LevelFlags::INFO);
    scheduler.run_once();

    assert_eq!(search.matches().to_vec(), vec![hit(0, 0, 2), hit(0, 3, 2), hit(0, 6, 2)]);
}

#[test]
fn test_case_sensitive_search() {
    let (scheduler, source) = setup();
    let search = livelog::search()
        .source(source.clone())
        .matching("Error")
        .ignore_case(false)
        .max_wait(Duration::ZERO)
        .start(scheduler.clone())
        .unwrap();

    source.add_entry("error", LevelFlags::ERROR);
    source.add_entry("Error", LevelFlags::ERROR);
    scheduler.run_once();

    assert_eq!(search.matches().to_vec(), vec![hit(1, 0, 5)]);
}

#[test]
fn test_large_append_is_fetched_in_batches() {
    let (scheduler, source) = setup();
    let search = livelog::search()
        .source(source.clone())
        .matching("x")
        .max_batch_size(2)
        .max_wait(Duration::ZERO)
        .start(scheduler.clone())
        .unwrap();

    source.add_entries((0..5).map(|i| (format!("x{i}"), LevelFlags::INFO)));
    scheduler.run_once();

    let indices: Vec<usize> = search.matches().iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(search.stats().records_scanned, 5);
}

#[test]
fn test_filter_without_spans_matches_whole_entry() {
    let (scheduler, source) = setup();
    let search = livelog::search()
        .source(source.clone())
        .with_filter(LevelFilter::new(LevelFlags::ERROR))
        .max_wait(Duration::ZERO)
        .start(scheduler.clone())
        .unwrap();

    source.add_entry("fine", LevelFlags::INFO);
    source.add_entry("broken", LevelFlags::ERROR);
    scheduler.run_once();

    assert_eq!(search.matches().to_vec(), vec![hit(1, 0, 6)]);
}

#[test]
fn test_term_and_filter_combine() {
    let (scheduler, source) = setup();
    let search = livelog::search()
        .source(source.clone())
        .matching("disk")
        .with_filter(LevelFilter::new(LevelFlags::ERROR))
        .max_wait(Duration::ZERO)
        .start(scheduler.clone())
        .unwrap();

    source.add_entry("disk ok", LevelFlags::INFO);
    source.add_entry("disk failed", LevelFlags::ERROR);
    source.add_entry("cpu failed", LevelFlags::ERROR);
    scheduler.run_once();

    assert_eq!(search.matches().to_vec(), vec![hit(1, 0, 4)]);
}

#[test]
fn test_repeated_span_is_one_match() {
    let (scheduler, source) = setup();
    let search = livelog::search()
        .source(source.clone())
        .matching("disk")
        .with_filter(SubstringFilter::new("DISK", true).unwrap())
        .max_wait(Duration::ZERO)
        .start(scheduler.clone())
        .unwrap();

    source.add_entry("disk full", LevelFlags::ERROR);
    scheduler.run_once();

    assert_eq!(search.matches().to_vec(), vec![hit(0, 0, 4)]);
}

// ---------------------------------------------------------------------------
// Removal and reset
// ---------------------------------------------------------------------------

#[test]
fn test_removed_entries_drop_their_matches() {
    let (scheduler, source) = setup();
    let search = search_for("hit", &source, &scheduler);
    for text in ["hit", "miss", "hit", "hit", "miss"] {
        source.add_entry(text, LevelFlags::INFO);
    }
    scheduler.run_once();
    assert_eq!(search.count(), 3);

    assert_eq!(source.remove_from(2), 3);
    scheduler.run_once();
    assert_eq!(search.matches().to_vec(), vec![hit(0, 0, 3)]);

    source.add_entry("another hit", LevelFlags::INFO);
    scheduler.run_once();
    assert_eq!(search.matches().to_vec(), vec![hit(0, 0, 3), hit(2, 8, 3)]);
}

#[test]
fn test_reset_clears_matches() {
    let (scheduler, source) = setup();
    let search = search_for("a", &source, &scheduler);
    source.add_entry("a", LevelFlags::INFO);
    scheduler.run_once();
    assert_eq!(search.count(), 1);

    source.clear();
    scheduler.run_once();
    assert_eq!(search.count(), 0);

    source.add_entry("b a", LevelFlags::INFO);
    scheduler.run_once();
    assert_eq!(search.matches().to_vec(), vec![hit(0, 2, 1)]);
}

#[test]
fn test_source_fault_produces_no_matches() {
    let (scheduler, source) = setup();
    let search = search_for("a", &source, &scheduler);

    // The append is queued, then the entries vanish before the search fetches.
    source.add_entries([("a", LevelFlags::INFO), ("a", LevelFlags::INFO)]);
    source.remove_from(0);
    scheduler.run_once();

    assert_eq!(search.count(), 0);
    assert_eq!(search.stats().source_faults, 1);

    // The search keeps going.
    source.add_entry("a", LevelFlags::INFO);
    scheduler.run_once();
    assert_eq!(search.matches().to_vec(), vec![hit(0, 0, 1)]);
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

#[test]
fn test_listener_receives_full_lists() {
    let (scheduler, source) = setup();
    let search = search_for("x", &source, &scheduler);
    let listener = RecordingSearchListener::new();
    search.add_listener(listener.clone());

    source.add_entry("x", LevelFlags::INFO);
    scheduler.run_once();
    source.add_entry("xx", LevelFlags::INFO);
    scheduler.run_once();

    assert_eq!(
        listener.lists(),
        vec![
            vec![],
            vec![hit(0, 0, 1)],
            vec![hit(0, 0, 1), hit(1, 0, 1), hit(1, 1, 1)],
        ]
    );
    assert!(listener.searches().iter().all(|id| *id == search.id()));
}

#[test]
fn test_unchanged_round_is_not_published() {
    let (scheduler, source) = setup();
    let search = search_for("x", &source, &scheduler);
    let listener = RecordingSearchListener::new();
    search.add_listener(listener.clone());

    source.add_entry("nothing to see", LevelFlags::INFO);
    scheduler.run(3);

    assert_eq!(listener.len(), 1);
}

#[test]
fn test_late_listener_gets_current_matches() {
    let (scheduler, source) = setup();
    let search = search_for("x", &source, &scheduler);
    source.add_entry("x", LevelFlags::INFO);
    scheduler.run_once();

    let listener = RecordingSearchListener::new();
    let token = search.add_listener(listener.clone());
    assert_eq!(listener.lists(), vec![vec![hit(0, 0, 1)]]);

    assert!(search.remove_listener(token));
    source.add_entry("x", LevelFlags::INFO);
    scheduler.run_once();
    assert_eq!(listener.len(), 1);
}

/// Unsubscribes itself from the first list it is told after subscribing.
struct OneShot {
    search: Weak<LogSourceSearch>,
    token: Mutex<Option<ListenerToken>>,
    lengths: Mutex<Vec<usize>>,
}

impl SearchListener for OneShot {
    fn on_search_modified(&self, _search: SearchId, matches: &[LogMatch]) {
        self.lengths.lock().push(matches.len());
        let token = self.token.lock().take();
        if let (Some(token), Some(search)) = (token, self.search.upgrade()) {
            search.remove_listener(token);
        }
    }
}

#[test]
fn test_listener_may_unsubscribe_itself() {
    let (scheduler, source) = setup();
    let search = Arc::new(search_for("x", &source, &scheduler));
    let listener = Arc::new(OneShot {
        search: Arc::downgrade(&search),
        token: Mutex::new(None),
        lengths: Mutex::new(Vec::new()),
    });
    let token = search.add_listener(listener.clone());
    *listener.token.lock() = Some(token);

    source.add_entry("x", LevelFlags::INFO);
    scheduler.run_once();
    source.add_entry("x", LevelFlags::INFO);
    scheduler.run_once();

    assert_eq!(*listener.lengths.lock(), vec![0, 1]);
    assert_eq!(search.count(), 2);
    assert!(listener.token.lock().is_none());
}

/// Appends one entry to the source it listens to, on the first append.
struct Echo {
    source: InMemoryLogSource,
    echoed: AtomicBool,
    seen: Mutex<Vec<Modification>>,
}

impl LogSourceListener for Echo {
    fn on_modified(&self, _source: SourceId, modification: Modification) {
        self.seen.lock().push(modification);
        if matches!(modification, Modification::Appended(_)) && !self.echoed.swap(true, Ordering::SeqCst) {
            self.source.add_entry("echo", LevelFlags::INFO);
        }
    }
}

#[test]
fn test_listener_may_mutate_source() {
    let (_, source) = setup();
    let echo = Arc::new(Echo {
        source: source.clone(),
        echoed: AtomicBool::new(false),
        seen: Mutex::new(Vec::new()),
    });
    let policy = NotifierPolicy::new(100, Duration::ZERO).unwrap();
    let token = source.add_listener(echo.clone(), policy);

    source.add_entry("call", LevelFlags::INFO);

    assert_eq!(source.count(), 2);
    assert_eq!(
        *echo.seen.lock(),
        vec![
            Modification::Reset,
            Modification::appended(0, 1),
            Modification::appended(1, 1),
        ]
    );
    assert!(source.remove_listener(token));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_detach_discards_queued_notifications() {
    let (scheduler, source) = setup();
    let search = search_for("x", &source, &scheduler);
    source.add_entry("x", LevelFlags::INFO);

    search.detach();
    search.detach();
    assert!(search.is_detached());
    assert_eq!(source.listener_count(), 0);
    assert_eq!(scheduler.periodic_task_count(), 0);

    scheduler.run_once();
    source.add_entry("x", LevelFlags::INFO);
    scheduler.run_once();
    assert_eq!(search.count(), 0);
}

#[test]
fn test_drop_releases_task_and_subscription() {
    let (scheduler, source) = setup();
    let search = search_for("x", &source, &scheduler);
    assert_eq!(source.listener_count(), 1);
    assert_eq!(scheduler.periodic_task_count(), 1);

    drop(search);

    assert_eq!(source.listener_count(), 0);
    assert_eq!(scheduler.periodic_task_count(), 0);
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[test]
fn test_builder_requires_source() {
    let (scheduler, _) = setup();
    let err = livelog::search().matching("x").start(scheduler).err().unwrap();
    assert!(matches!(err, LiveLogError::MissingSource));
}

#[test]
fn test_builder_requires_criteria() {
    let (scheduler, source) = setup();

    let err = livelog::search()
        .source(source.clone())
        .matching("")
        .start(scheduler.clone())
        .err()
        .unwrap();
    assert!(matches!(err, LiveLogError::EmptySearchTerm));

    let err = livelog::search().source(source).start(scheduler).err().unwrap();
    assert!(matches!(err, LiveLogError::EmptySearchTerm));
}

#[test]
fn test_builder_rejects_zero_batch() {
    let (scheduler, source) = setup();
    let err = livelog::search()
        .source(source.clone())
        .matching("x")
        .max_batch_size(0)
        .start(scheduler.clone())
        .err()
        .unwrap();
    assert!(matches!(err, LiveLogError::InvalidBatchSize(0)));
    assert_eq!(source.listener_count(), 0);
    assert_eq!(scheduler.periodic_task_count(), 0);
}

// ---------------------------------------------------------------------------
// Threaded
// ---------------------------------------------------------------------------

#[test]
fn test_search_on_task_scheduler() {
    init_tracing();
    let scheduler = Arc::new(TaskScheduler::with_workers(2).unwrap());
    let source = InMemoryLogSource::new();
    let polling = source.start_polling(&*scheduler, Duration::from_millis(5));

    let search = livelog::search()
        .source(source.clone())
        .matching("needle")
        .interval(Duration::from_millis(5))
        .start(scheduler.clone())
        .unwrap();

    for i in 0..50 {
        let text = if i % 10 == 0 { "needle" } else { "hay" };
        source.add_entry(text, LevelFlags::INFO);
    }

    assert!(wait_until(Duration::from_secs(5), || search.count() == 5));
    let indices: Vec<usize> = search.matches().iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![0, 10, 20, 30, 40]);

    let stats = search.stats();
    assert_eq!(stats.records_scanned, 50);
    assert_eq!(stats.matches, 5);

    assert!(scheduler.remove_periodic(&polling));
}
