//! The [`SkillHandler`] and [`SkillFactory`] traits.

use super::SkillRegistry;
use super::error::SkillError;

/// Everything a handler learns about the command that triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillContext {
    /// Action identifier the handler is registered under (e.g. `"time.now"`).
    pub action: String,
    /// The segment as recognized, before normalization.
    pub text: String,
    /// Catalog phrase the segment matched.
    pub matched_phrase: String,
    /// Utterance language code.
    pub language: String,
    /// Match score on a 0–100 scale.
    pub score: f64,
}

impl SkillContext {
    /// Context with only the action and language set.
    pub fn new(action: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            text: String::new(),
            matched_phrase: String::new(),
            language: language.into(),
            score: 0.0,
        }
    }

    /// Attach the recognized segment text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Attach the matched catalog phrase and its score.
    #[must_use]
    pub fn with_match(mut self, phrase: impl Into<String>, score: f64) -> Self {
        self.matched_phrase = phrase.into();
        self.score = score;
        self
    }
}

/// A callable bound to an action identifier.
///
/// `Ok` carries the text to speak. A handler that returns an empty string, or
/// a string starting with `❌`/`⚠`, is treated by the executor as having
/// produced no output, the same as an `Err`.
pub trait SkillHandler: Send + Sync {
    /// Run the skill.
    fn invoke(&self, ctx: &SkillContext) -> Result<String, SkillError>;
}

impl<F> SkillHandler for F
where
    F: Fn(&SkillContext) -> Result<String, SkillError> + Send + Sync,
{
    fn invoke(&self, ctx: &SkillContext) -> Result<String, SkillError> {
        self(ctx)
    }
}

/// Builds a fresh [`SkillRegistry`]; used when skills are restarted.
pub trait SkillFactory: Send {
    /// Build a new registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be assembled; the executor then
    /// keeps the registry it already has.
    fn build(&self) -> crate::error::Result<SkillRegistry>;
}

impl<F> SkillFactory for F
where
    F: Fn() -> crate::error::Result<SkillRegistry> + Send,
{
    fn build(&self) -> crate::error::Result<SkillRegistry> {
        self()
    }
}
