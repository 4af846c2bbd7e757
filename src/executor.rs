//! Turns one utterance into one reply.
//!
//! The executor segments the text, matches every segment, and builds the
//! reply from the matched entries:
//!
//! - **Skill**: the registered handler runs; its output is spoken unless it
//!   failed, was empty, or is error-shaped (`❌`/`⚠`), in which case the
//!   entry's template response is spoken instead.
//! - **Meta**: the template response is spoken. The `reload_dataset` and
//!   `restart_skills` commands also swap the catalog and/or skill registry.
//! - **SmallTalk**: the template response is spoken.
//!
//! Per-segment replies are joined with a space. Nothing here returns an
//! error to the caller; every failure ends in a spoken string.
//!
//! All segments of one utterance see the catalog and registry that were
//! current when the utterance arrived; a reload takes effect from the next one.

use crate::config::{AssistantConfig, ResponseConfig};
use crate::dataset::{Category, Dataset, DatasetSource};
use crate::error::{AssistantError, Result};
use crate::matcher::{IntentMatcher, MatchOutcome, MatchPolicy, MatchResult};
use crate::skills::{SkillContext, SkillFactory, SkillRegistry};
use crate::text::{Normalizer, Segmenter};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Meta key that reloads the catalog (and skills, when a factory is set).
pub const RELOAD_DATASET: &str = "reload_dataset";
/// Meta key that rebuilds the skill registry.
pub const RESTART_SKILLS: &str = "restart_skills";

/// Answers utterances nothing in the catalog matched.
pub trait FallbackResponder: Send {
    /// A reply for `text`, or `None` to fall through to "not understood".
    fn respond(&self, text: &str, language: &str) -> Option<String>;
}

impl<F> FallbackResponder for F
where
    F: Fn(&str, &str) -> Option<String> + Send,
{
    fn respond(&self, text: &str, language: &str) -> Option<String> {
        self(text, language)
    }
}

/// Whether a skill result signals failure rather than text to speak.
pub fn is_error_shaped(output: &str) -> bool {
    let trimmed = output.trim_start();
    trimmed.starts_with('❌') || trimmed.starts_with('⚠')
}

/// Segment → match → dispatch → aggregated reply.
pub struct Executor {
    matcher: Arc<IntentMatcher>,
    segmenter: Segmenter,
    skills: Arc<SkillRegistry>,
    dataset_source: Option<Box<dyn DatasetSource>>,
    skill_factory: Option<Box<dyn SkillFactory>>,
    fallback: Option<Box<dyn FallbackResponder>>,
    responses: ResponseConfig,
    base_language: String,
}

impl Executor {
    /// Assemble an executor from its parts.
    pub fn new(
        matcher: IntentMatcher,
        segmenter: Segmenter,
        skills: SkillRegistry,
        responses: ResponseConfig,
        base_language: impl Into<String>,
    ) -> Self {
        warn_missing_actions(&skills, matcher.dataset());
        Self {
            matcher: Arc::new(matcher),
            segmenter,
            skills: Arc::new(skills),
            dataset_source: None,
            skill_factory: None,
            fallback: None,
            responses,
            base_language: base_language.into(),
        }
    }

    /// Build an executor over `dataset` with the matching, text and response
    /// settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns a config error if wake phrases or stop-words cannot be compiled.
    pub fn from_config(
        config: &AssistantConfig,
        dataset: Dataset,
        skills: SkillRegistry,
    ) -> Result<Self> {
        let normalizer = Arc::new(Normalizer::from_config(config)?);
        let matcher = IntentMatcher::new(
            Arc::new(dataset),
            normalizer,
            MatchPolicy::from_config(&config.matcher),
            config.matcher.cache_capacity,
        );
        Ok(Self::new(
            matcher,
            Segmenter::from_config(&config.text),
            skills,
            config.responses.clone(),
            config.assistant.default_language.clone(),
        ))
    }

    /// Where `reload_dataset` fetches a fresh catalog.
    #[must_use]
    pub fn with_dataset_source(mut self, source: impl DatasetSource + 'static) -> Self {
        self.dataset_source = Some(Box::new(source));
        self
    }

    /// How `restart_skills` rebuilds the registry.
    #[must_use]
    pub fn with_skill_factory(mut self, factory: impl SkillFactory + 'static) -> Self {
        self.skill_factory = Some(Box::new(factory));
        self
    }

    /// Consulted when no segment of an utterance matched.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl FallbackResponder + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Current catalog snapshot.
    pub fn dataset(&self) -> &Arc<Dataset> {
        self.matcher.dataset()
    }

    /// Current matcher.
    pub fn matcher(&self) -> &IntentMatcher {
        &self.matcher
    }

    /// Current skill registry.
    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    /// Canned responses.
    pub fn responses(&self) -> &ResponseConfig {
        &self.responses
    }

    /// Language used when a translation is missing.
    pub fn base_language(&self) -> &str {
        &self.base_language
    }

    /// Handle one utterance and return the reply to speak.
    ///
    /// Text that normalizes to nothing (only wake phrases or fillers) gets the
    /// `listening` response; text with content that nothing matched gets the
    /// fallback responder's answer or `not_understood`.
    pub fn handle(&mut self, text: &str, language: &str) -> String {
        let language = if language.trim().is_empty() {
            self.base_language.clone()
        } else {
            language.trim().to_owned()
        };

        let matcher = Arc::clone(&self.matcher);
        let skills = Arc::clone(&self.skills);
        let segments = self.segmenter.split(text);
        let mut replies: Vec<String> = Vec::with_capacity(segments.len());
        let mut had_content = false;
        let mut matched_any = false;

        for segment in &segments {
            match matcher.match_segment(segment) {
                MatchOutcome::Empty => {
                    debug!(segment = %segment, "segment has no content, skipping");
                }
                MatchOutcome::NoMatch { best_score } => {
                    had_content = true;
                    info!(segment = %segment, best_score, "segment not understood");
                }
                MatchOutcome::Matched(result) => {
                    had_content = true;
                    matched_any = true;
                    let reply = self.dispatch(segment, &result, &language, &skills);
                    if !reply.trim().is_empty() {
                        replies.push(reply);
                    }
                }
            }
        }

        if !had_content {
            return self.canned(&self.responses.listening, &language);
        }
        if !matched_any {
            return self.not_understood(text, &language);
        }
        let reply = replies.join(" ");
        if reply.is_empty() {
            self.canned(&self.responses.not_understood, &language)
        } else {
            reply
        }
    }

    fn dispatch(
        &mut self,
        segment: &str,
        result: &MatchResult,
        language: &str,
        skills: &SkillRegistry,
    ) -> String {
        let template = result
            .response()
            .resolve(language, &self.base_language)
            .to_owned();

        match result.category() {
            Category::SmallTalk => template,
            Category::Meta => {
                let command = result
                    .action()
                    .unwrap_or(result.pattern.group_key.as_str())
                    .to_owned();
                let outcome = match command.as_str() {
                    RELOAD_DATASET => self.reload_dataset(),
                    RESTART_SKILLS => self.restart_skills(),
                    _ => Ok(()),
                };
                match outcome {
                    Ok(()) => template,
                    Err(e) => {
                        warn!(command = %command, error = %e, "meta command failed");
                        self.canned(&self.responses.reload_failed, language)
                    }
                }
            }
            Category::Skill => {
                let Some(action) = result.action() else {
                    return template;
                };
                let ctx = SkillContext::new(action, language)
                    .with_text(segment)
                    .with_match(result.pattern.phrase.clone(), result.score);
                match skills.invoke(&ctx) {
                    Ok(output) if !output.trim().is_empty() && !is_error_shaped(&output) => {
                        debug!(action = %action, "skill produced reply");
                        output
                    }
                    Ok(output) => {
                        warn!(
                            action = %action,
                            output = %output,
                            "skill returned no usable output"
                        );
                        template
                    }
                    Err(e) => {
                        warn!(
                            action = %action,
                            error = %e,
                            "skill failed, using template response"
                        );
                        template
                    }
                }
            }
        }
    }

    fn not_understood(&self, text: &str, language: &str) -> String {
        if let Some(fallback) = &self.fallback
            && let Some(answer) = fallback.respond(text, language)
            && !answer.trim().is_empty()
        {
            debug!("fallback responder answered");
            return answer;
        }
        self.canned(&self.responses.not_understood, language)
    }

    fn canned(&self, text: &crate::config::LocalizedText, language: &str) -> String {
        text.resolve(language, &self.base_language).to_owned()
    }

    /// Load a fresh catalog and, when a skill factory is set, a fresh
    /// registry, then swap both in. On any error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns an error if no dataset source is configured, or if loading the
    /// catalog or building the registry fails.
    pub fn reload_dataset(&mut self) -> Result<()> {
        let Some(source) = &self.dataset_source else {
            return Err(AssistantError::Dataset(
                "no dataset source configured".to_owned(),
            ));
        };
        let dataset = Arc::new(source.load()?);
        let skills = match &self.skill_factory {
            Some(factory) => Some(factory.build()?),
            None => None,
        };

        self.matcher = Arc::new(self.matcher.with_dataset(dataset));
        if let Some(skills) = skills {
            self.skills = Arc::new(skills);
        }
        warn_missing_actions(&self.skills, self.matcher.dataset());
        info!(patterns = self.matcher.dataset().len(), "dataset reloaded");
        Ok(())
    }

    /// Build a fresh registry and swap it in. On error the old one stays.
    ///
    /// # Errors
    ///
    /// Returns an error if no skill factory is configured or it fails.
    pub fn restart_skills(&mut self) -> Result<()> {
        let Some(factory) = &self.skill_factory else {
            return Err(AssistantError::Skill(
                "no skill factory configured".to_owned(),
            ));
        };
        self.skills = Arc::new(factory.build()?);
        warn_missing_actions(&self.skills, self.matcher.dataset());
        info!(actions = self.skills.len(), "skills restarted");
        Ok(())
    }
}

fn warn_missing_actions(skills: &SkillRegistry, dataset: &Dataset) {
    for action in skills.missing_actions(dataset) {
        warn!(
            action = %action,
            "catalog action has no registered skill, template responses will be used"
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::skills::SkillError;
    use std::sync::Mutex;

    const CATALOG: &str = r#"
        [[skills.apps.commands]]
        patterns = ["открой браузер", "open the browser"]
        action = "apps.browser"
        response = { ru = "Открываю браузер.", en = "Opening the browser." }

        [[skills.time.commands]]
        patterns = ["который час"]
        action = "time.now"
        response = "Сейчас посмотрю."

        [[skills.web.commands]]
        patterns = ["найди в интернете"]
        action = "web.search"
        response = { ru = "Ищу в интернете.", en = "Searching the web." }

        [meta.reload_dataset]
        patterns = ["обнови датасет"]
        response = { ru = "Датасет обновлён.", en = "Dataset reloaded." }

        [meta.restart_skills]
        patterns = ["перезапусти навыки"]
        response = { ru = "Навыки перезапущены." }

        [[smalltalk.commands]]
        patterns = ["привет"]
        response = "Здравствуйте!"
    "#;

    fn executor(skills: SkillRegistry) -> Executor {
        let dataset = Dataset::from_toml_str(CATALOG).unwrap();
        Executor::from_config(&AssistantConfig::default(), dataset, skills).unwrap()
    }

    fn browser_skills() -> SkillRegistry {
        let mut skills = SkillRegistry::new();
        skills.register_fn("apps.browser", |_| Ok("Браузер открыт.".to_owned()));
        skills
    }

    struct FailingSource;

    impl DatasetSource for FailingSource {
        fn load(&self) -> Result<Dataset> {
            Dataset::from_toml_str("this is [not toml")
        }
    }

    struct StaticSource(&'static str);

    impl DatasetSource for StaticSource {
        fn load(&self) -> Result<Dataset> {
            Dataset::from_toml_str(self.0)
        }
    }

    #[test]
    fn smalltalk_uses_template() {
        let mut ex = executor(SkillRegistry::new());
        assert_eq!(ex.handle("привет", "ru"), "Здравствуйте!");
    }

    #[test]
    fn skill_output_is_preferred() {
        let mut ex = executor(browser_skills());
        assert_eq!(ex.handle("открой браузер", "ru"), "Браузер открыт.");
    }

    #[test]
    fn unregistered_skill_falls_back_to_template() {
        let mut ex = executor(SkillRegistry::new());
        assert_eq!(ex.handle("найди в интернете", "ru"), "Ищу в интернете.");
        assert_eq!(ex.handle("найди в интернете", "en"), "Searching the web.");
    }

    #[test]
    fn error_shaped_and_failing_skills_fall_back() {
        let mut skills = SkillRegistry::new();
        skills.register_fn("apps.browser", |_| Ok("❌ браузер не найден".to_owned()));
        skills.register_fn("web.search", |_| Ok("⚠️ нет сети".to_owned()));
        skills.register_fn("time.now", |ctx| Err(SkillError::failed(ctx.action.clone(), "clock")));
        let mut ex = executor(skills);
        assert_eq!(ex.handle("открой браузер", "ru"), "Открываю браузер.");
        assert_eq!(ex.handle("найди в интернете", "ru"), "Ищу в интернете.");
        assert_eq!(ex.handle("который час", "ru"), "Сейчас посмотрю.");
    }

    #[test]
    fn panicking_skill_does_not_abort_other_segments() {
        let mut skills = SkillRegistry::new();
        skills.register_fn("apps.browser", |_| panic!("crashed"));
        let mut ex = executor(skills);
        assert_eq!(
            ex.handle("открой браузер и привет", "ru"),
            "Открываю браузер. Здравствуйте!"
        );
    }

    #[test]
    fn segment_replies_are_joined_in_order() {
        let mut ex = executor(browser_skills());
        assert_eq!(
            ex.handle("привет, открой браузер", "ru"),
            "Здравствуйте! Браузер открыт."
        );
    }

    #[test]
    fn skill_receives_segment_context() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut skills = SkillRegistry::new();
        skills.register_fn("time.now", move |ctx| {
            *sink.lock().unwrap() = Some(ctx.clone());
            Ok("12:00".to_owned())
        });
        let mut ex = executor(skills);
        ex.handle("который час", "en");
        let ctx = seen.lock().unwrap().clone().unwrap();
        assert_eq!(ctx.action, "time.now");
        assert_eq!(ctx.text, "который час");
        assert_eq!(ctx.matched_phrase, "который час");
        assert_eq!(ctx.language, "en");
    }

    #[test]
    fn unmatched_text_is_not_understood() {
        let mut ex = executor(SkillRegistry::new());
        assert_eq!(
            ex.handle("квантовая хромодинамика", "ru"),
            "Извини, я не понял, что ты сказал."
        );
        assert_eq!(
            ex.handle("квантовая хромодинамика", "en"),
            "Sorry, I didn't understand that."
        );
    }

    #[test]
    fn fallback_responder_answers_unmatched_text() {
        let mut ex = executor(SkillRegistry::new())
            .with_fallback(|text: &str, _lang: &str| Some(format!("Не знаю про «{text}».")));
        assert_eq!(
            ex.handle("квантовая хромодинамика", "ru"),
            "Не знаю про «квантовая хромодинамика»."
        );
    }

    #[test]
    fn content_free_text_gets_listening_reply() {
        let mut ex = executor(SkillRegistry::new());
        assert_eq!(ex.handle("пожалуйста", "ru"), "Да, я слушаю.");
    }

    #[test]
    fn missing_translation_uses_base_language() {
        let mut ex = executor(SkillRegistry::new())
            .with_skill_factory(|| -> Result<SkillRegistry> { Ok(SkillRegistry::new()) });
        assert_eq!(ex.handle("перезапусти навыки", "en"), "Навыки перезапущены.");
    }

    #[test]
    fn restart_without_factory_reports_failure() {
        let mut ex = executor(SkillRegistry::new());
        assert_eq!(
            ex.handle("перезапусти навыки", "en"),
            "Reload failed, keeping the previous commands."
        );
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let mut ex = executor(SkillRegistry::new()).with_dataset_source(FailingSource);
        let before = Arc::clone(ex.dataset());
        assert_eq!(
            ex.handle("обнови датасет", "ru"),
            "Не удалось обновить датасет, оставляю прежний."
        );
        assert!(Arc::ptr_eq(&before, ex.dataset()));
        assert_eq!(ex.handle("привет", "ru"), "Здравствуйте!");
    }

    #[test]
    fn successful_reload_swaps_snapshot() {
        const NEXT: &str = r#"
            [meta.reload_dataset]
            patterns = ["обнови датасет"]
            response = "Готово."

            [[smalltalk.commands]]
            patterns = ["доброе утро"]
            response = "И вам доброе утро!"
        "#;
        let mut ex = executor(SkillRegistry::new()).with_dataset_source(StaticSource(NEXT));
        assert_eq!(ex.handle("обнови датасет", "en"), "Dataset reloaded.");
        assert_eq!(ex.dataset().len(), 2);
        assert_eq!(ex.handle("доброе утро", "ru"), "И вам доброе утро!");
        assert_eq!(ex.matcher().cached_segments(), 1);
    }

    #[test]
    fn reload_takes_effect_from_the_next_utterance() {
        const NEXT: &str = r#"
            [meta.reload_dataset]
            patterns = ["обнови датасет"]
            response = "Готово."

            [[smalltalk.commands]]
            patterns = ["привет"]
            response = "Привет-привет!"
        "#;
        let mut ex = executor(SkillRegistry::new()).with_dataset_source(StaticSource(NEXT));
        assert_eq!(
            ex.handle("обнови датасет и привет", "ru"),
            "Датасет обновлён. Здравствуйте!"
        );
        assert_eq!(ex.handle("привет", "ru"), "Привет-привет!");
    }

    #[test]
    fn restarted_skills_serve_only_later_utterances() {
        let mut ex = executor(SkillRegistry::new())
            .with_skill_factory(|| -> Result<SkillRegistry> { Ok(browser_skills()) });
        assert_eq!(
            ex.handle("перезапусти навыки и открой браузер", "ru"),
            "Навыки перезапущены. Открываю браузер."
        );
        assert_eq!(ex.handle("открой браузер", "ru"), "Браузер открыт.");
    }

    #[test]
    fn restart_skills_swaps_registry() {
        let mut ex = executor(SkillRegistry::new())
            .with_skill_factory(|| -> Result<SkillRegistry> { Ok(browser_skills()) });
        assert_eq!(ex.handle("открой браузер", "ru"), "Открываю браузер.");
        assert_eq!(ex.handle("перезапусти навыки", "ru"), "Навыки перезапущены.");
        assert_eq!(ex.handle("открой браузер", "ru"), "Браузер открыт.");
    }

    #[test]
    fn error_shape_detection() {
        assert!(is_error_shaped("❌ failed"));
        assert!(is_error_shaped("  ⚠️ careful"));
        assert!(is_error_shaped("⚠ careful"));
        assert!(!is_error_shaped("Готово ✅"));
    }
}
