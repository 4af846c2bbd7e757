//! Message types passed between pipeline stages.

use std::time::Instant;

/// A recognized turn from the speech recognizer.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// The recognized text. Empty means nothing intelligible was heard.
    pub text: String,
    /// Language code reported by the recognizer; empty when unknown.
    pub language: String,
    /// When the recognizer finished this turn.
    pub received_at: Instant,
}

impl Utterance {
    /// An utterance received now.
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            received_at: Instant::now(),
        }
    }

    /// Whether the recognizer heard nothing.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Text for the speech-output collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// What to say.
    pub text: String,
    /// Language to say it in.
    pub language: String,
}

impl Reply {
    /// A reply in `language`.
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// Out-of-band event from the wake-word spotter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeSignal;
