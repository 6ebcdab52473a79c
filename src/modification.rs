use std::fmt;

/// A contiguous range of entries: `count` entries starting at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Section {
    /// Zero-based index of the first entry.
    pub index: usize,

    /// Number of entries in the range.
    pub count: usize,
}

impl Section {
    pub const fn new(index: usize, count: usize) -> Self {
        Self { index, count }
    }

    /// One past the last index covered by this section.
    pub const fn end(&self) -> usize {
        self.index + self.count
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[#{}, #{})", self.index, self.end())
    }
}

/// One change reported by a [`LogSource`](crate::LogSource) to one of its listeners.
///
/// Within the stream delivered to a single listener, sections are contiguous
/// and monotonic: a listener is only ever told about `Removed` ranges it was
/// previously told exist, and `Appended` ranges always start where the last
/// known range ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modification {
    /// Everything reported so far is invalid; indices restart at zero.
    Reset,

    /// New entries were appended. `count` is never zero.
    Appended(Section),

    /// A suffix of the previously reported entries, from `index` to the end
    /// of what the listener knew, is gone.
    Removed(Section),
}

impl Modification {
    pub const fn appended(index: usize, count: usize) -> Self {
        Self::Appended(Section::new(index, count))
    }

    pub const fn removed(index: usize, count: usize) -> Self {
        Self::Removed(Section::new(index, count))
    }

    pub const fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }

    /// The section carried by an `Appended` or `Removed` modification.
    pub const fn section(&self) -> Option<Section> {
        match self {
            Self::Reset => None,
            Self::Appended(s) | Self::Removed(s) => Some(*s),
        }
    }
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => f.write_str("reset"),
            Self::Appended(s) => write!(f, "appended {s}"),
            Self::Removed(s) => write!(f, "removed {s}"),
        }
    }
}
