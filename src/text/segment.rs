//! Splitting one utterance into independent commands.

const DELIMITER: char = '\u{1f}';

/// Splits "open the browser and play music" into two commands.
#[derive(Debug, Clone)]
pub struct Segmenter {
    separators: Vec<String>,
}

impl Segmenter {
    /// Build from separator tokens such as `" и "`, `" and then "`, `","`.
    ///
    /// Surrounding spaces are significant: `" и "` splits on the word "и" but
    /// not inside "музыки". Whitespace-only separators are ignored.
    pub fn new<I, S>(separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut separators: Vec<String> = separators
            .into_iter()
            .map(|s| s.as_ref().to_lowercase().replace(DELIMITER, ""))
            .filter(|s| !s.trim().is_empty())
            .collect();
        // "and then" must be consumed before "and".
        separators.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));
        separators.dedup();
        Self { separators }
    }

    /// Segmenter using the `[text]` config section.
    pub fn from_config(config: &crate::config::TextConfig) -> Self {
        Self::new(&config.separators)
    }

    /// Split `text` into trimmed, non-empty, lower-cased segments in spoken order.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut t = text.to_lowercase().replace(DELIMITER, " ");
        let marker = format!(" {DELIMITER} ");
        for sep in &self.separators {
            // A single pass misses back-to-back separators that share a space.
            while t.contains(sep.as_str()) {
                t = t.replace(sep.as_str(), &marker);
            }
        }
        t.split(DELIMITER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}
