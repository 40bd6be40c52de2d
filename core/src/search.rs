//! Search filtering and match highlighting for the log view

use crate::{LogEntry, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Search box state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LogFilter {
    pub query: String,
    pub match_case: bool,
    pub match_whole_word: bool,
    pub use_regex: bool,
}

impl LogFilter {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Build a matcher for the current options.
    ///
    /// Fails only when `use_regex` is set and the query is not a valid pattern.
    pub fn compile(&self) -> Result<SearchMatcher> {
        if self.query.is_empty() {
            return Ok(SearchMatcher { regex: None });
        }

        let mut pattern = if self.use_regex {
            self.query.clone()
        } else {
            regex::escape(&self.query)
        };
        if self.match_whole_word {
            pattern = format!(r"\b(?:{})\b", pattern);
        }

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!self.match_case)
            .build()?;
        Ok(SearchMatcher { regex: Some(regex) })
    }
}

/// Compiled search; an empty query matches everything and highlights nothing
#[derive(Debug, Clone, Default)]
pub struct SearchMatcher {
    regex: Option<Regex>,
}

impl SearchMatcher {
    pub fn is_active(&self) -> bool {
        self.regex.is_some()
    }

    pub fn is_match(&self, entry: &LogEntry) -> bool {
        match &self.regex {
            Some(re) => re.is_match(&entry.payload),
            None => true,
        }
    }

    /// Byte ranges of every match in `text`, ascending and non-overlapping
    pub fn highlight_ranges(&self, text: &str) -> Vec<Range<usize>> {
        match &self.regex {
            Some(re) => re
                .find_iter(text)
                .map(|m| m.range())
                .filter(|r| !r.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Positions of the matching entries, in order
    pub fn matching_indices<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a LogEntry>,
    ) -> Vec<usize> {
        entries
            .into_iter()
            .enumerate()
            .filter(|(_, e)| self.is_match(e))
            .map(|(i, _)| i)
            .collect()
    }
}
