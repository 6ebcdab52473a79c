//! Composable entry filters.
//!
//! Leaf filters test one property of an entry (its text, its level, whether it
//! is blank); [`AndFilter`], [`OrFilter`] and [`NotFilter`] combine them into
//! an immutable tree. [`create`] builds the usual quick-filter shape from
//! [`FilterOptions`].

mod level;
mod logical;
mod pattern;
mod registry;
mod substring;

pub use level::{AcceptAll, LevelFilter, RejectEmpty};
pub use logical::{AndFilter, NotFilter, OrFilter};
pub use pattern::{RegexFilter, WildcardFilter};
pub use registry::{FilterConstructor, FilterRegistry, MatchType};
pub use substring::SubstringFilter;

use crate::entry::LevelFlags;
use crate::error::LiveLogError;
use crate::traits::LogFilter;

/// The user-facing description of a filter: query text, how to interpret it,
/// and which levels to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    /// Text to look for. Empty means "no text condition".
    pub query: String,

    /// Registry token of the text match type, see [`MatchType`].
    pub match_type: String,

    pub ignore_case: bool,

    /// Keep entries that do *not* match the text condition.
    pub inverted: bool,

    /// Levels to keep. [`LevelFlags::ALL`] means "no level condition".
    pub levels: LevelFlags,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            match_type: MatchType::Substring.into(),
            ignore_case: true,
            inverted: false,
            levels: LevelFlags::ALL,
        }
    }
}

impl FilterOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn match_type(mut self, match_type: impl Into<String>) -> Self {
        self.match_type = match_type.into();
        self
    }

    pub fn ignore_case(mut self, yes: bool) -> Self {
        self.ignore_case = yes;
        self
    }

    pub fn inverted(mut self, yes: bool) -> Self {
        self.inverted = yes;
        self
    }

    pub fn levels(mut self, levels: LevelFlags) -> Self {
        self.levels = levels;
        self
    }
}

/// Build the filter described by `options`.
///
/// The text condition (inverted if requested) and the level condition are
/// combined with [`all`]; an empty query and a full level mask each
/// contribute nothing, so default options accept everything.
///
/// # Errors
///
/// Construction faults from the registry: unknown match type or an invalid
/// pattern.
pub fn create(registry: &FilterRegistry, options: &FilterOptions) -> Result<Box<dyn LogFilter>, LiveLogError> {
    let mut filters: Vec<Box<dyn LogFilter>> = Vec::new();

    if !options.query.is_empty() {
        let text = registry.build(&options.match_type, &options.query, options.ignore_case)?;
        filters.push(if options.inverted {
            Box::new(NotFilter::new(text))
        } else {
            text
        });
    }

    if options.levels != LevelFlags::ALL {
        filters.push(Box::new(LevelFilter::new(options.levels)));
    }

    Ok(all(filters))
}

/// Conjunction of `filters`: [`AcceptAll`] for none, the filter itself for
/// one, an [`AndFilter`] otherwise.
pub fn all(filters: Vec<Box<dyn LogFilter>>) -> Box<dyn LogFilter> {
    let mut filters = filters;
    match filters.len() {
        0 => Box::new(AcceptAll),
        1 => filters.remove(0),
        _ => Box::new(AndFilter::new(filters)),
    }
}
