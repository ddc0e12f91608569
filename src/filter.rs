//! Journal read filter built from the configured priority threshold.
//!
//! journald filters are a list of `FIELD=value` matches; matches added before
//! a disjunction are OR-ed together. A threshold therefore becomes one match
//! per kept level, flattened into a single OR group.

use crate::domain::Severity;
use std::fmt;

#[cfg(test)]
use mockall::automock;

pub const PRIORITY_FIELD: &str = "PRIORITY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalMatch {
    pub field: &'static str,
    pub value: &'static str,
}

impl JournalMatch {
    pub fn priority(level: Severity) -> Self {
        Self {
            field: PRIORITY_FIELD,
            value: level.as_numeric_str(),
        }
    }
}

impl fmt::Display for JournalMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Match API of the journal reader.
#[cfg_attr(test, automock(type Error = String;))]
pub trait JournalMatcher {
    type Error;

    fn add_match(&mut self, expression: &str) -> Result<(), Self::Error>;

    fn add_disjunction(&mut self) -> Result<(), Self::Error>;
}

/// A single OR group of journal matches. Empty means "read unfiltered".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityFilter {
    matches: Vec<JournalMatch>,
}

impl PriorityFilter {
    pub fn matches(&self) -> &[JournalMatch] {
        &self.matches
    }

    pub fn is_unfiltered(&self) -> bool {
        self.matches.is_empty()
    }

    /// Match expressions in application order, e.g. `["PRIORITY=0", ...]`.
    pub fn expressions(&self) -> Vec<String> {
        self.matches.iter().map(ToString::to_string).collect()
    }

    /// Adds every match followed by one disjunction. No-op when unfiltered.
    pub fn apply<J: JournalMatcher>(&self, journal: &mut J) -> Result<(), J::Error> {
        if self.is_unfiltered() {
            return Ok(());
        }
        for journal_match in &self.matches {
            journal.add_match(&journal_match.to_string())?;
        }
        journal.add_disjunction()
    }
}

/// Keeps every level as urgent as `min_priority` or more, i.e. numerically
/// `<=` it. Debug keeps everything, so it compiles to no filter at all.
pub fn compile_filter(min_priority: Severity) -> PriorityFilter {
    if min_priority == Severity::Debug {
        return PriorityFilter::default();
    }

    PriorityFilter {
        matches: Severity::ALL
            .into_iter()
            .filter(|level| *level <= min_priority)
            .map(JournalMatch::priority)
            .collect(),
    }
}
