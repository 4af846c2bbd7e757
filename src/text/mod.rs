//! Text preprocessing shared by the activation gate and the intent matcher.

pub mod normalize;
pub mod segment;
pub mod wake;

pub use normalize::Normalizer;
pub use segment::Segmenter;
pub use wake::WakeWords;

use crate::error::{AssistantError, Result};
use regex::Regex;

/// Compile a whole-word alternation over `phrases`, longest first.
///
/// Words inside a phrase match across any run of whitespace. Returns `None`
/// when there is nothing to match.
pub(crate) fn whole_word_regex(phrases: &[String]) -> Result<Option<Regex>> {
    let mut sorted: Vec<&String> = phrases.iter().filter(|p| !p.trim().is_empty()).collect();
    if sorted.is_empty() {
        return Ok(None);
    }
    sorted.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));

    let alternatives: Vec<String> = sorted
        .iter()
        .map(|p| {
            p.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));

    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| AssistantError::Config(format!("invalid word list: {e}")))
}

/// Collapse whitespace runs to single spaces and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
