mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use livelog::{ListenerCollection, ListenerNotifier, LiveLogError, Modification, NotifierPolicy, SourceId};

use common::RecordingListener;

fn notifier(listener: &Arc<RecordingListener>, min_interval: Duration, max_batch_size: usize) -> ListenerNotifier {
    let policy = NotifierPolicy::new(max_batch_size, min_interval).unwrap();
    ListenerNotifier::new(SourceId::next(), listener.clone(), policy).unwrap()
}

const HOUR: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn test_zero_batch_size_is_rejected() {
    let err = NotifierPolicy::new(0, Duration::ZERO).unwrap_err();
    assert!(matches!(err, LiveLogError::InvalidBatchSize(0)));
    assert!(err.is_construction_fault());
}

#[test]
fn test_default_policy() {
    let policy = NotifierPolicy::default();
    assert_eq!(policy.max_batch_size, 1000);
    assert_eq!(policy.min_interval, Duration::from_millis(10));
}

#[test]
fn test_construction_emits_reset() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, HOUR, 10);
    assert_eq!(listener.modifications(), vec![Modification::Reset]);
    assert_eq!(notifier.last_reported_count(), 0);
}

// ---------------------------------------------------------------------------
// Appends
// ---------------------------------------------------------------------------

#[test]
fn test_batched_append() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::ZERO, 1);

    for total in 1..=4 {
        notifier.on_count_observed(total);
    }

    assert_eq!(
        listener.modifications(),
        vec![
            Modification::Reset,
            Modification::appended(0, 1),
            Modification::appended(1, 1),
            Modification::appended(2, 1),
            Modification::appended(3, 1),
        ]
    );
}

#[test]
fn test_coalesced_append() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, HOUR, 4);

    notifier.on_count_observed(1);
    notifier.on_count_observed(2);
    notifier.on_count_observed(3);
    assert_eq!(listener.modifications(), vec![Modification::Reset]);

    notifier.on_count_observed(4);
    assert_eq!(listener.modifications(), vec![Modification::Reset, Modification::appended(0, 4)]);
}

#[test]
fn test_large_burst_is_chunked() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, HOUR, 1000);

    notifier.on_count_observed(2000);

    assert_eq!(
        listener.modifications(),
        vec![
            Modification::Reset,
            Modification::appended(0, 1000),
            Modification::appended(1000, 1000),
        ]
    );
}

#[test]
fn test_remainder_waits_for_interval() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::from_millis(100), 100);

    notifier.on_count_observed(9);
    assert_eq!(listener.modifications(), vec![Modification::Reset]);

    thread::sleep(Duration::from_millis(150));
    notifier.on_count_observed(9);
    assert_eq!(listener.modifications(), vec![Modification::Reset, Modification::appended(0, 9)]);
}

#[test]
fn test_unchanged_count_is_silent() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::ZERO, 10);

    notifier.on_count_observed(3);
    notifier.on_count_observed(3);
    notifier.on_count_observed(2);

    assert_eq!(listener.modifications(), vec![Modification::Reset, Modification::appended(0, 3)]);
}

// ---------------------------------------------------------------------------
// Resets
// ---------------------------------------------------------------------------

#[test]
fn test_reset_right_after_construction_is_deduplicated() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, HOUR, 1);

    notifier.on_reset();

    assert_eq!(listener.modifications(), vec![Modification::Reset]);
}

#[test]
fn test_consecutive_resets_with_throttled_append() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::from_millis(100), 100);

    notifier.on_count_observed(1);
    notifier.on_reset();
    notifier.on_reset();
    notifier.on_reset();

    assert_eq!(listener.modifications(), vec![Modification::Reset]);
}

#[test]
fn test_reset_after_append_is_forwarded() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::ZERO, 10);

    notifier.on_count_observed(5);
    notifier.on_reset();
    notifier.on_reset();
    notifier.on_count_observed(3);

    assert_eq!(
        listener.modifications(),
        vec![
            Modification::Reset,
            Modification::appended(0, 5),
            Modification::Reset,
            Modification::appended(0, 3),
        ]
    );
}

// ---------------------------------------------------------------------------
// Removals
// ---------------------------------------------------------------------------

#[test]
fn test_removal_is_clamped_to_reported_range() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::from_secs(1), 10);

    notifier.on_count_observed(10);
    notifier.on_count_observed(12);
    notifier.on_removed_from(0, 12);

    assert_eq!(
        listener.modifications(),
        vec![
            Modification::Reset,
            Modification::appended(0, 10),
            Modification::removed(0, 10),
        ]
    );
    assert_eq!(notifier.last_reported_count(), 0);
}

#[test]
fn test_removal_after_several_batches() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::from_secs(1), 10);

    notifier.on_count_observed(10);
    notifier.on_count_observed(20);
    notifier.on_count_observed(22);
    notifier.on_removed_from(0, 22);

    assert_eq!(
        listener.modifications(),
        vec![
            Modification::Reset,
            Modification::appended(0, 10),
            Modification::appended(10, 10),
            Modification::removed(0, 20),
        ]
    );
}

#[test]
fn test_removal_beyond_reported_range_is_dropped() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::from_millis(100), 100);

    notifier.on_count_observed(9);
    thread::sleep(Duration::from_millis(150));
    notifier.on_count_observed(9);
    assert_eq!(listener.modifications(), vec![Modification::Reset, Modification::appended(0, 9)]);

    notifier.on_count_observed(35);
    notifier.on_removed_from(10, 25);

    assert_eq!(listener.modifications(), vec![Modification::Reset, Modification::appended(0, 9)]);
    assert_eq!(notifier.last_reported_count(), 9);
}

#[test]
fn test_partial_removal_then_regrowth() {
    let listener = RecordingListener::new();
    let notifier = notifier(&listener, Duration::ZERO, 100);

    notifier.on_count_observed(10);
    notifier.on_removed_from(4, 6);
    notifier.on_count_observed(8);

    assert_eq!(
        listener.modifications(),
        vec![
            Modification::Reset,
            Modification::appended(0, 10),
            Modification::removed(4, 6),
            Modification::appended(4, 4),
        ]
    );
}

// ---------------------------------------------------------------------------
// ListenerCollection
// ---------------------------------------------------------------------------

#[test]
fn test_collection_fans_out_independently() {
    let source = SourceId::next();
    let listeners = ListenerCollection::new(source);
    let fast = RecordingListener::new();
    let slow = RecordingListener::new();

    listeners.add_listener(fast.clone(), NotifierPolicy::new(1, Duration::ZERO).unwrap());
    listeners.add_listener(slow.clone(), NotifierPolicy::new(100, HOUR).unwrap());

    listeners.on_count_observed(2);

    assert_eq!(
        fast.modifications(),
        vec![Modification::Reset, Modification::appended(0, 1), Modification::appended(1, 1)]
    );
    assert_eq!(slow.modifications(), vec![Modification::Reset]);
    assert!(fast.sources().iter().all(|s| *s == source));
}

#[test]
fn test_collection_remove_listener() {
    let listeners = ListenerCollection::new(SourceId::next());
    let listener = RecordingListener::new();

    let token = listeners.add_listener(listener.clone(), NotifierPolicy::new(1, Duration::ZERO).unwrap());
    assert_eq!(listeners.len(), 1);
    assert!(listeners.remove_listener(token));
    assert!(!listeners.remove_listener(token));
    assert!(listeners.is_empty());

    listeners.on_count_observed(5);
    assert_eq!(listener.modifications(), vec![Modification::Reset]);
}

#[test]
fn test_collection_replaces_invalid_policy() {
    let listeners = ListenerCollection::new(SourceId::next());
    let listener = RecordingListener::new();

    let invalid = NotifierPolicy {
        max_batch_size: 0,
        min_interval: Duration::ZERO,
    };
    listeners.add_listener(listener.clone(), invalid);
    listeners.on_count_observed(1500);

    assert_eq!(
        listener.modifications(),
        vec![Modification::Reset, Modification::appended(0, 1000)]
    );
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    Grow(usize),
    Truncate(usize),
    Reset,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..300).prop_map(Op::Grow),
        1 => (0usize..300).prop_map(Op::Truncate),
        1 => Just(Op::Reset),
    ]
}

proptest! {
    /// Without throttling, the listener's view tracks the source exactly and
    /// every notification is consistent with what was reported before.
    #[test]
    fn prop_notifications_track_source(batch in 1usize..64, ops in prop::collection::vec(op(), 1..40)) {
        let listener = RecordingListener::new();
        let notifier = notifier(&listener, Duration::ZERO, batch);
        let mut total = 0usize;

        for op in &ops {
            match *op {
                Op::Grow(n) => {
                    total += n;
                    notifier.on_count_observed(total);
                }
                Op::Truncate(to) => {
                    let to = to.min(total);
                    if to < total {
                        notifier.on_removed_from(to, total - to);
                    }
                    total = to;
                }
                Op::Reset => {
                    total = 0;
                    notifier.on_reset();
                }
            }
            prop_assert_eq!(notifier.last_reported_count(), total);
        }

        let mut known = 0usize;
        for modification in listener.modifications() {
            match modification {
                Modification::Reset => known = 0,
                Modification::Appended(section) => {
                    prop_assert!(section.count > 0);
                    prop_assert!(section.count <= batch);
                    prop_assert_eq!(section.index, known);
                    known = section.end();
                }
                Modification::Removed(section) => {
                    prop_assert!(section.count > 0);
                    prop_assert_eq!(section.end(), known);
                    known = section.index;
                }
            }
        }
        prop_assert_eq!(known, total);
    }

    /// Removals are never larger than what the listener was told about.
    #[test]
    fn prop_removal_is_clamped(reported in 0usize..500, from in 0usize..600, n in 0usize..600) {
        let listener = RecordingListener::new();
        let notifier = notifier(&listener, Duration::ZERO, 1000);
        notifier.on_count_observed(reported);
        listener.clear();

        notifier.on_removed_from(from, n);

        let events = listener.modifications();
        if from >= reported {
            prop_assert!(events.is_empty());
            prop_assert_eq!(notifier.last_reported_count(), reported);
        } else {
            prop_assert_eq!(events, vec![Modification::removed(from, reported - from)]);
            prop_assert_eq!(notifier.last_reported_count(), from);
        }
    }
}
