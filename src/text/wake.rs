//! Whole-word wake phrase detection.

use super::{collapse_whitespace, whole_word_regex};
use crate::error::Result;
use regex::Regex;

/// The configured wake phrases and a compiled matcher for them.
///
/// Matching is case-insensitive and whole-word: `"jarvis"` is found in
/// `"Jarvis, open"` but not in `"jarvisopen"`. Longer phrases win over the
/// shorter phrases they contain (`"hey jarvis"` over `"jarvis"`).
#[derive(Debug, Clone)]
pub struct WakeWords {
    phrases: Vec<String>,
    pattern: Option<Regex>,
}

impl WakeWords {
    /// Compile `phrases`. Blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns a config error if the phrases cannot be compiled.
    pub fn new<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| collapse_whitespace(&p.as_ref().to_lowercase()))
            .filter(|p| !p.is_empty())
            .collect();
        phrases.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
        phrases.dedup();
        let pattern = whole_word_regex(&phrases)?;
        Ok(Self { phrases, pattern })
    }

    /// No wake phrases at all.
    pub fn none() -> Self {
        Self {
            phrases: Vec::new(),
            pattern: None,
        }
    }

    /// Configured phrases, longest first.
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Byte range of the first wake phrase in `text`.
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        let m = self.pattern.as_ref()?.find(text)?;
        Some((m.start(), m.end()))
    }

    /// Whether `text` mentions a wake phrase as a whole word.
    pub fn contains(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// Remove every wake phrase occurrence and the punctuation left dangling
    /// at the edges ("Джарвис, привет!" → "привет").
    pub fn strip(&self, text: &str) -> String {
        self.remove(text)
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_owned()
    }

    /// Remove every wake phrase occurrence, leaving other characters alone.
    pub(crate) fn remove(&self, text: &str) -> String {
        let mut current = collapse_whitespace(text);
        let Some(pattern) = &self.pattern else {
            return current;
        };
        loop {
            let next = collapse_whitespace(&pattern.replace_all(&current, " "));
            if next == current {
                return current;
            }
            current = next;
        }
    }
}
