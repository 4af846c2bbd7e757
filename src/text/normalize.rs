//! Utterance normalization ahead of fuzzy matching.

use super::{WakeWords, collapse_whitespace, whole_word_regex};
use crate::error::{AssistantError, Result};
use regex::Regex;

/// Lower-cases text and strips punctuation, wake phrases and stop-words.
///
/// The result is a fixpoint: normalizing an already-normalized string returns
/// it unchanged. An empty result means "no content", not an error.
#[derive(Debug, Clone)]
pub struct Normalizer {
    wake_words: WakeWords,
    stopwords: Option<Regex>,
    non_word: Regex,
}

impl Normalizer {
    /// Build a normalizer from the wake phrases and the union of all stop-words.
    ///
    /// # Errors
    ///
    /// Returns a config error if the stop-word list cannot be compiled.
    pub fn new(wake_words: WakeWords, stopwords: &[String]) -> Result<Self> {
        let stopwords: Vec<String> = stopwords.iter().map(|w| w.to_lowercase()).collect();
        let non_word = Regex::new(r"[^\w\s']")
            .map_err(|e| AssistantError::Config(format!("invalid normalizer pattern: {e}")))?;
        Ok(Self {
            wake_words,
            stopwords: whole_word_regex(&stopwords)?,
            non_word,
        })
    }

    /// Normalizer built from the `[wake_words]` and `[text]` config sections.
    ///
    /// # Errors
    ///
    /// Returns a config error if either list cannot be compiled.
    pub fn from_config(config: &crate::config::AssistantConfig) -> Result<Self> {
        let wake = WakeWords::new(config.wake_words.all())?;
        Self::new(wake, &config.text.all_stopwords())
    }

    /// The wake phrases this normalizer removes.
    pub fn wake_words(&self) -> &WakeWords {
        &self.wake_words
    }

    /// Normalize `text` for matching.
    pub fn normalize(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        let mut current = collapse_whitespace(&self.non_word.replace_all(&lower, " "));

        // Removing one phrase can bring two others together, so repeat until stable.
        loop {
            let mut next = self.wake_words.remove(&current);
            if let Some(stop) = &self.stopwords {
                next = collapse_whitespace(&stop.replace_all(&next, " "));
            }
            if next == current {
                return current;
            }
            current = next;
        }
    }
}
