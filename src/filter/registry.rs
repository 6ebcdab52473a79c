use std::collections::HashMap;
use std::fmt;

use crate::error::LiveLogError;
use crate::traits::LogFilter;

use super::{RegexFilter, SubstringFilter, WildcardFilter};

/// Builds a text filter from a query and a case rule.
pub type FilterConstructor = Box<dyn Fn(&str, bool) -> Result<Box<dyn LogFilter>, LiveLogError> + Send + Sync>;

/// The text match types livelog ships constructors for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchType {
    #[default]
    Substring,
    Wildcard,
    Regex,
}

impl MatchType {
    /// Token under which [`FilterRegistry::with_builtin`] registers this type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::Wildcard => "wildcard",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MatchType> for String {
    fn from(m: MatchType) -> Self {
        m.as_str().to_owned()
    }
}

/// Maps match type tokens (as stored in settings) to filter constructors.
///
/// Built explicitly and handed to [`create`](super::create); there is no
/// process-wide registry. Tokens are case-insensitive.
pub struct FilterRegistry {
    constructors: HashMap<String, FilterConstructor>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl FilterRegistry {
    /// A registry without any match types.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry knowing `substring`, `wildcard` and `regex`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(MatchType::Substring, |query, ignore_case| {
            Ok(Box::new(SubstringFilter::new(query, ignore_case)?))
        });
        registry.register(MatchType::Wildcard, |query, ignore_case| {
            Ok(Box::new(WildcardFilter::new(query, ignore_case)?))
        });
        registry.register(MatchType::Regex, |query, ignore_case| {
            Ok(Box::new(RegexFilter::new(query, ignore_case)?))
        });
        registry
    }

    /// Register (or replace) the constructor for `token`.
    pub fn register<F>(&mut self, token: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&str, bool) -> Result<Box<dyn LogFilter>, LiveLogError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(token.into().to_lowercase(), Box::new(constructor));
        self
    }

    pub fn contains(&self, token: &str) -> bool {
        self.constructors.contains_key(&token.to_lowercase())
    }

    /// Build a text filter of type `token`.
    ///
    /// # Errors
    ///
    /// `UnknownFilterType` for unregistered tokens, otherwise whatever the
    /// constructor reports (usually `InvalidPattern`).
    pub fn build(&self, token: &str, query: &str, ignore_case: bool) -> Result<Box<dyn LogFilter>, LiveLogError> {
        let constructor = self
            .constructors
            .get(&token.to_lowercase())
            .ok_or_else(|| LiveLogError::UnknownFilterType(token.to_owned()))?;
        constructor(query, ignore_case)
    }
}
