use thiserror::Error;

use crate::modification::Section;

#[derive(Error, Debug)]
pub enum LiveLogError {
    // Construction
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("search term may not be empty")]
    EmptySearchTerm,

    #[error("invalid batch size")]
    InvalidBatchSize(usize),

    #[error("invalid thread count")]
    InvalidThreadCount(usize),

    #[error("unknown filter type: {0}")]
    UnknownFilterType(String),

    #[error("no source provided")]
    MissingSource,

    // Source
    #[error("section {section} is out of range ({count} entries available)")]
    OutOfRange { section: Section, count: usize },

    #[error("source error: {0}")]
    Source(String),

    // Runtime
    #[error("failed to spawn thread")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("scheduler has shut down")]
    SchedulerShutdown,
}

impl LiveLogError {
    /// Whether work can continue after this error.
    ///
    /// Source faults are expected while a source is being truncated or reset
    /// underneath a reader: the affected section simply produces nothing and
    /// the next notification catches up. A panicking task only loses its own
    /// invocation.
    ///
    /// Construction faults and thread spawn failures are fatal for the object
    /// being built.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. } | Self::Source(_) | Self::TaskPanicked(_)
        )
    }

    /// Whether this error was raised while validating constructor arguments.
    pub fn is_construction_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern(_)
                | Self::EmptySearchTerm
                | Self::InvalidBatchSize(_)
                | Self::InvalidThreadCount(_)
                | Self::UnknownFilterType(_)
                | Self::MissingSource
        )
    }
}

/// Render a panic payload caught by `catch_unwind` as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
