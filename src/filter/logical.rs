use crate::entry::LogEntry;
use crate::results::MatchSpan;
use crate::traits::LogFilter;

/// Matches when every child matches. Without children it matches everything.
pub struct AndFilter {
    children: Vec<Box<dyn LogFilter>>,
}

impl AndFilter {
    pub fn new(children: Vec<Box<dyn LogFilter>>) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &[Box<dyn LogFilter>] {
        &self.children
    }
}

impl LogFilter for AndFilter {
    fn is_match(&self, entry: &LogEntry) -> bool {
        self.children.iter().all(|f| f.is_match(entry))
    }

    /// Spans of every child, whether or not the conjunction holds.
    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
        self.children.iter().flat_map(|f| f.find_matches(entry)).collect()
    }
}

/// Matches when any child matches. Without children it matches nothing.
pub struct OrFilter {
    children: Vec<Box<dyn LogFilter>>,
}

impl OrFilter {
    pub fn new(children: Vec<Box<dyn LogFilter>>) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &[Box<dyn LogFilter>] {
        &self.children
    }
}

impl LogFilter for OrFilter {
    fn is_match(&self, entry: &LogEntry) -> bool {
        self.children.iter().any(|f| f.is_match(entry))
    }

    fn find_matches(&self, entry: &LogEntry) -> Vec<MatchSpan> {
        self.children.iter().flat_map(|f| f.find_matches(entry)).collect()
    }
}

/// Inverts its child. Never reports spans: a negation has no positive hit to
/// highlight.
pub struct NotFilter {
    child: Box<dyn LogFilter>,
}

impl NotFilter {
    pub fn new(child: Box<dyn LogFilter>) -> Self {
        Self { child }
    }
}

impl LogFilter for NotFilter {
    fn is_match(&self, entry: &LogEntry) -> bool {
        !self.child.is_match(entry)
    }

    fn find_matches(&self, _entry: &LogEntry) -> Vec<MatchSpan> {
        Vec::new()
    }
}
