//! # livelog
//!
//! Live log change propagation: periodic scheduling, throttled change
//! notifications, composable filters and incremental search.
//!
//! A [`LogSource`] grows (and occasionally shrinks or resets) while it is
//! being watched. Each listener subscribed to it gets its own
//! [`ListenerNotifier`], which turns the observed entry count into a minimal
//! stream of [`Modification`]s: `Reset`, `Appended(section)` and
//! `Removed(section)`. Bursts are batched, trickles are coalesced, and a
//! listener is never told to remove entries it was never told about.
//!
//! A [`LogSourceSearch`] consumes that stream on a periodic task of a
//! [`Scheduler`], fetching only the appended sections and keeping an ordered
//! match list. A [`SearchProxy`] lets consumers hold on to one search handle
//! while the underlying search is replaced.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use livelog::{InMemoryLogSource, LevelFlags, ManualScheduler};
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//! let source = InMemoryLogSource::new();
//! source.add_entry("service started", LevelFlags::INFO);
//! source.add_entry("connection refused", LevelFlags::ERROR);
//!
//! let search = livelog::search()
//!     .source(source.clone())
//!     .matching("refused")
//!     .max_wait(Duration::ZERO)
//!     .start(scheduler.clone())?;
//!
//! // The search task runs on the scheduler; drive it by hand here.
//! scheduler.run_once();
//!
//! let matches = search.matches();
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].index, 1);
//! assert_eq!(matches[0].span.start, 11);
//! # Ok::<(), livelog::LiveLogError>(())
//! ```
//!
//! In an application, use a [`TaskScheduler`] instead: it runs periodic tasks
//! on its own driver thread and worker pool.
//!
//! # Filters
//!
//! Filters implement [`LogFilter`] and compose:
//!
//! ```rust
//! use livelog::filter::{self, FilterOptions, FilterRegistry, MatchType};
//! use livelog::{LevelFlags, LogEntry, LogFilter};
//!
//! let registry = FilterRegistry::with_builtin();
//! let options = FilterOptions::new("disk *full")
//!     .match_type(MatchType::Wildcard)
//!     .levels(LevelFlags::WARNING | LevelFlags::ERROR);
//! let f = filter::create(&registry, &options)?;
//!
//! assert!(f.is_match(&LogEntry::new(0, "Disk is full", LevelFlags::ERROR)));
//! assert!(!f.is_match(&LogEntry::new(1, "Disk is full", LevelFlags::INFO)));
//! # Ok::<(), livelog::LiveLogError>(())
//! ```

#![forbid(unsafe_code)]

pub mod filter;
pub mod scheduler;

mod builder;
mod engine;
mod entry;
mod error;
mod listeners;
mod modification;
mod notifier;
mod proxy;
mod results;
mod source;
mod traits;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::SearchBuilder;
pub use engine::LogSourceSearch;
pub use entry::{LevelFlags, LogEntry};
pub use error::LiveLogError;
pub use listeners::{ListenerCollection, ListenerToken};
pub use modification::{Modification, Section};
pub use notifier::{ListenerNotifier, NotifierPolicy};
pub use proxy::SearchProxy;
pub use results::{LogMatch, MatchSpan, SearchStats};
pub use scheduler::{ManualScheduler, PeriodicTaskHandle, Scheduler, SchedulerExt, TaskHandle, TaskScheduler};
pub use source::InMemoryLogSource;
pub use traits::{LogFilter, LogSource, LogSourceListener, SearchId, SearchListener, SourceId};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`SearchBuilder`] to configure and start a live search.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use livelog::{InMemoryLogSource, LevelFlags, TaskScheduler};
///
/// let scheduler = Arc::new(TaskScheduler::with_workers(2)?);
/// let source = InMemoryLogSource::new();
///
/// let search = livelog::search()
///     .source(source.clone())
///     .matching("error")
///     .interval(Duration::from_millis(5))
///     .start(scheduler.clone())?;
///
/// source.add_entry("an error occurred", LevelFlags::ERROR);
///
/// // Matches show up once the notifier has flushed and the task has run.
/// println!("{} matches so far", search.count());
/// # Ok::<(), livelog::LiveLogError>(())
/// ```
pub fn search() -> SearchBuilder {
    SearchBuilder::default()
}
