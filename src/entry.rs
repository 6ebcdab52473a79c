use std::fmt;

use bitflags::bitflags;

/// A single record produced by a [`LogSource`](crate::traits::LogSource).
///
/// The core never interprets the content of an entry except through a
/// [`LogFilter`](crate::traits::LogFilter). `index` is assigned by the source
/// and is strictly ordered within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Zero-based position of the entry in its source.
    pub index: usize,

    /// The entry's text, as read from the source.
    pub raw_content: String,

    /// Severity of the entry. Sources that cannot tell use [`LevelFlags::OTHER`].
    pub level: LevelFlags,
}

impl LogEntry {
    pub fn new(index: usize, raw_content: impl Into<String>, level: LevelFlags) -> Self {
        Self {
            index,
            raw_content: raw_content.into(),
            level,
        }
    }
}

bitflags! {
    /// Severity of a log entry. Also used as a mask by level filters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LevelFlags: u8 {
        const TRACE   = 0b0000_0001;
        const DEBUG   = 0b0000_0010;
        const INFO    = 0b0000_0100;
        const WARNING = 0b0000_1000;
        const ERROR   = 0b0001_0000;
        const FATAL   = 0b0010_0000;
        /// Entries without a recognisable level.
        const OTHER   = 0b0100_0000;

        const ALL = Self::TRACE.bits()
            | Self::DEBUG.bits()
            | Self::INFO.bits()
            | Self::WARNING.bits()
            | Self::ERROR.bits()
            | Self::FATAL.bits()
            | Self::OTHER.bits();
    }
}

impl Default for LevelFlags {
    fn default() -> Self {
        Self::OTHER
    }
}

impl fmt::Display for LevelFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("all");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|").to_lowercase())
        }
    }
}
