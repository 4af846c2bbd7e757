//! Fuzzy intent matching against the pattern catalog.
//!
//! Each segment is normalized and scored against every catalog phrase with
//! two metrics: [`fuzz::token_set_ratio`] (word order and extra words do not
//! matter) and [`fuzz::partial_ratio`] (truncated or embedded phrases). The
//! best candidate is accepted by the first tier of [`MatchPolicy`] it passes:
//!
//! | Tier | Accepts when |
//! |------|--------------|
//! | `Primary` | best score ≥ `threshold` |
//! | `SmallTalkRelaxed` | best is SmallTalk and score ≥ `max(smalltalk_floor, threshold − smalltalk_margin)` |
//! | `PartialFallback` | best partial score ≥ `max(partial_floor, ⌊threshold · partial_factor⌋)` |
//!
//! Equal scores resolve to the entry that comes first in the catalog.

pub mod fuzz;

use crate::config::MatcherConfig;
use crate::dataset::{Category, Dataset, PatternEntry, Response};
use crate::text::Normalizer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Which acceptance tier let a match through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Scored at or above the main threshold.
    Primary,
    /// Short conversational phrase accepted on the looser SmallTalk bar.
    SmallTalkRelaxed,
    /// Accepted on the partial-similarity fallback.
    PartialFallback,
}

/// Outcome of matching one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// The catalog entry that matched.
    pub pattern: PatternEntry,
    /// Similarity on a 0–100 scale.
    pub score: f64,
    /// Tier that accepted the match.
    pub tier: MatchTier,
}

impl MatchResult {
    /// Category of the matched entry.
    pub fn category(&self) -> Category {
        self.pattern.category
    }

    /// Dispatch target of the matched entry.
    pub fn action(&self) -> Option<&str> {
        self.pattern.action.as_deref()
    }

    /// Reply template of the matched entry.
    pub fn response(&self) -> &Response {
        &self.pattern.response
    }
}

/// What matching a segment produced.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The segment normalized to nothing (only wake words, fillers, punctuation).
    Empty,
    /// Nothing cleared any tier.
    NoMatch {
        /// Highest score seen, for diagnostics.
        best_score: f64,
    },
    /// A catalog entry was accepted.
    Matched(MatchResult),
}

/// A scored catalog index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position in [`Dataset::entries`].
    pub index: usize,
    /// Similarity on a 0–100 scale.
    pub score: f64,
}

/// Tiered acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Primary acceptance threshold.
    pub threshold: f64,
    /// Absolute floor of the SmallTalk tier.
    pub smalltalk_floor: f64,
    /// Distance below `threshold` the SmallTalk tier reaches.
    pub smalltalk_margin: f64,
    /// Absolute floor of the partial fallback tier.
    pub partial_floor: f64,
    /// Fraction of `threshold` the partial fallback requires.
    pub partial_factor: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::from_config(&MatcherConfig::default())
    }
}

impl MatchPolicy {
    /// Policy from the `[matcher]` config section.
    pub fn from_config(config: &MatcherConfig) -> Self {
        Self {
            threshold: config.threshold,
            smalltalk_floor: config.smalltalk_floor,
            smalltalk_margin: config.smalltalk_margin,
            partial_floor: config.partial_floor,
            partial_factor: config.partial_factor,
        }
    }

    /// Same policy with a different primary threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Minimum score for the SmallTalk tier.
    pub fn smalltalk_bar(&self) -> f64 {
        self.smalltalk_floor.max(self.threshold - self.smalltalk_margin)
    }

    /// Minimum partial score for the fallback tier.
    pub fn partial_bar(&self) -> f64 {
        self.partial_floor
            .max((self.threshold * self.partial_factor).floor())
    }

    /// Apply the tiers in order; the first that passes wins.
    ///
    /// `best` is the overall best candidate and `best_category` its category;
    /// `best_partial` is the best candidate under the partial metric alone.
    pub fn decide(
        &self,
        best: Candidate,
        best_category: Category,
        best_partial: Candidate,
    ) -> Option<(Candidate, MatchTier)> {
        if best.score >= self.threshold {
            return Some((best, MatchTier::Primary));
        }
        if best_category == Category::SmallTalk && best.score >= self.smalltalk_bar() {
            return Some((best, MatchTier::SmallTalkRelaxed));
        }
        if best_partial.score >= self.partial_bar() {
            return Some((best_partial, MatchTier::PartialFallback));
        }
        None
    }
}

/// Matches segments against one catalog snapshot.
///
/// Results are memoized per normalized segment. A reload builds a new matcher
/// (see [`IntentMatcher::with_dataset`]), which starts with an empty cache.
pub struct IntentMatcher {
    dataset: Arc<Dataset>,
    normalized: Vec<String>,
    normalizer: Arc<Normalizer>,
    policy: MatchPolicy,
    cache: Mutex<HashMap<String, MatchOutcome>>,
    cache_capacity: usize,
}

impl IntentMatcher {
    /// Build a matcher over `dataset`, normalizing every catalog phrase once.
    pub fn new(
        dataset: Arc<Dataset>,
        normalizer: Arc<Normalizer>,
        policy: MatchPolicy,
        cache_capacity: usize,
    ) -> Self {
        let normalized = dataset
            .entries()
            .iter()
            .map(|e| normalizer.normalize(&e.phrase))
            .collect();
        Self {
            dataset,
            normalized,
            normalizer,
            policy,
            cache: Mutex::new(HashMap::new()),
            cache_capacity,
        }
    }

    /// A matcher over a different snapshot with the same normalizer and policy.
    pub fn with_dataset(&self, dataset: Arc<Dataset>) -> Self {
        Self::new(
            dataset,
            Arc::clone(&self.normalizer),
            self.policy,
            self.cache_capacity,
        )
    }

    /// The snapshot this matcher reads.
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Active policy.
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Normalizer shared with the rest of the pipeline.
    pub fn normalizer(&self) -> &Arc<Normalizer> {
        &self.normalizer
    }

    /// Number of memoized segments.
    pub fn cached_segments(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Match one utterance segment.
    pub fn match_segment(&self, segment: &str) -> MatchOutcome {
        let normalized = self.normalizer.normalize(segment);
        if normalized.is_empty() {
            return MatchOutcome::Empty;
        }

        if let Ok(cache) = self.cache.lock()
            && let Some(hit) = cache.get(&normalized)
        {
            return hit.clone();
        }

        let outcome = match self.evaluate(&normalized) {
            (Some(result), _) => {
                debug!(
                    segment = %normalized,
                    phrase = %result.pattern.phrase,
                    score = result.score,
                    tier = ?result.tier,
                    "segment matched"
                );
                MatchOutcome::Matched(result)
            }
            (None, best_score) => {
                debug!(segment = %normalized, best_score, "no match above thresholds");
                MatchOutcome::NoMatch { best_score }
            }
        };

        if self.cache_capacity > 0
            && let Ok(mut cache) = self.cache.lock()
        {
            if cache.len() >= self.cache_capacity {
                cache.clear();
            }
            cache.insert(normalized, outcome.clone());
        }
        outcome
    }

    /// Score a normalized segment against every phrase and apply the policy.
    fn evaluate(&self, normalized: &str) -> (Option<MatchResult>, f64) {
        let mut best_set: Option<Candidate> = None;
        let mut best_partial: Option<Candidate> = None;

        for (index, phrase) in self.normalized.iter().enumerate() {
            if phrase.is_empty() {
                continue;
            }
            let set_score = fuzz::token_set_ratio(normalized, phrase);
            if best_set.is_none_or(|c| set_score > c.score) {
                best_set = Some(Candidate {
                    index,
                    score: set_score,
                });
            }
            let partial_score = fuzz::partial_ratio(normalized, phrase);
            if best_partial.is_none_or(|c| partial_score > c.score) {
                best_partial = Some(Candidate {
                    index,
                    score: partial_score,
                });
            }
        }

        let (Some(best_set), Some(best_partial)) = (best_set, best_partial) else {
            return (None, 0.0);
        };
        let best = if best_set.score >= best_partial.score {
            best_set
        } else {
            best_partial
        };

        let entries = self.dataset.entries();
        let decision = self
            .policy
            .decide(best, entries[best.index].category, best_partial);
        let result = decision.map(|(candidate, tier)| MatchResult {
            pattern: entries[candidate.index].clone(),
            score: candidate.score,
            tier,
        });
        (result, best.score)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::AssistantConfig;

    const CATALOG: &str = r#"
        [[skills.apps.commands]]
        patterns = ["открой браузер", "open the browser"]
        action = "apps.browser"
        response = "Открываю браузер."

        [[skills.music.commands]]
        patterns = ["включи музыку"]
        action = "music.play"
        response = "Включаю музыку."

        [[skills.time.commands]]
        patterns = ["который час"]
        action = "time.now"
        response = "Сейчас скажу."

        [[smalltalk.commands]]
        patterns = ["привет"]
        response = "Здравствуйте!"

        [[smalltalk.commands]]
        patterns = ["как дела"]
        response = "Отлично!"
    "#;

    fn matcher_with(policy: MatchPolicy) -> IntentMatcher {
        let dataset = Arc::new(Dataset::from_toml_str(CATALOG).unwrap());
        let normalizer = Arc::new(Normalizer::from_config(&AssistantConfig::default()).unwrap());
        IntentMatcher::new(dataset, normalizer, policy, 16)
    }

    fn matcher() -> IntentMatcher {
        matcher_with(MatchPolicy::default())
    }

    fn matched(outcome: MatchOutcome) -> MatchResult {
        match outcome {
            MatchOutcome::Matched(m) => m,
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn exact_phrase_matches_primary() {
        let m = matched(matcher().match_segment("Открой браузер!"));
        assert_eq!(m.action(), Some("apps.browser"));
        assert_eq!(m.tier, MatchTier::Primary);
        assert!((m.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn reordered_words_and_fillers_still_match() {
        let m = matched(matcher().match_segment("браузер открой пожалуйста"));
        assert_eq!(m.action(), Some("apps.browser"));
    }

    #[test]
    fn wake_only_segment_is_empty() {
        assert_eq!(matcher().match_segment("Джарвис!"), MatchOutcome::Empty);
        assert_eq!(matcher().match_segment("пожалуйста"), MatchOutcome::Empty);
    }

    #[test]
    fn unrelated_text_is_no_match() {
        let outcome = matcher().match_segment("квантовая хромодинамика");
        assert!(matches!(outcome, MatchOutcome::NoMatch { .. }), "{outcome:?}");
    }

    #[test]
    fn smalltalk_relaxed_tier_accepts_45_at_70() {
        let policy = MatchPolicy::default().with_threshold(70.0);
        let best = Candidate {
            index: 0,
            score: 45.0,
        };
        let decision = policy.decide(best, Category::SmallTalk, best);
        assert_eq!(decision, Some((best, MatchTier::SmallTalkRelaxed)));
    }

    #[test]
    fn skill_at_45_against_70_is_rejected() {
        let policy = MatchPolicy::default().with_threshold(70.0);
        let best = Candidate {
            index: 0,
            score: 45.0,
        };
        assert_eq!(policy.partial_bar(), 49.0);
        assert_eq!(policy.decide(best, Category::Skill, best), None);
    }

    #[test]
    fn partial_fallback_picks_partial_candidate() {
        let policy = MatchPolicy::default().with_threshold(90.0);
        let best = Candidate {
            index: 1,
            score: 70.0,
        };
        let partial = Candidate {
            index: 2,
            score: 65.0,
        };
        // partial bar = max(45, 63) = 63
        assert_eq!(
            policy.decide(best, Category::Skill, partial),
            Some((partial, MatchTier::PartialFallback))
        );
    }

    #[test]
    fn tier_bars_follow_threshold() {
        let policy = MatchPolicy::default();
        assert_eq!(policy.smalltalk_bar(), 40.0);
        assert_eq!(policy.with_threshold(50.0).smalltalk_bar(), 30.0);
        assert_eq!(policy.with_threshold(50.0).partial_bar(), 45.0);
    }

    #[test]
    fn raising_threshold_never_raises_accepted_score() {
        let segments = [
            "открой браузер",
            "открыть браузеры",
            "включи музыкy",
            "привеет",
            "как там дела",
            "который",
            "музыка",
            "что-то совсем другое",
        ];
        for segment in segments {
            let mut previous: Option<f64> = None;
            for step in 0..=20 {
                let threshold = f64::from(step) * 5.0;
                let m = matcher_with(MatchPolicy::default().with_threshold(threshold));
                let accepted = match m.match_segment(segment) {
                    MatchOutcome::Matched(r) => Some(r.score),
                    _ => None,
                };
                if let Some(prev) = previous {
                    let score = accepted.unwrap_or(f64::NEG_INFINITY);
                    assert!(
                        score <= prev,
                        "{segment:?}: score rose from {prev} to {score} at threshold {threshold}"
                    );
                }
                if accepted.is_none() {
                    // Once rejected, every higher threshold must reject too.
                    previous = Some(f64::NEG_INFINITY);
                } else {
                    previous = accepted;
                }
            }
        }
    }

    #[test]
    fn ties_resolve_to_first_catalog_entry() {
        let dataset = Arc::new(
            Dataset::from_toml_str(
                r#"
                [[smalltalk.commands]]
                patterns = ["hello"]
                response = "first"

                [[smalltalk.commands]]
                patterns = ["hello"]
                response = "second"
            "#,
            )
            .unwrap(),
        );
        let normalizer = Arc::new(Normalizer::from_config(&AssistantConfig::default()).unwrap());
        let m = IntentMatcher::new(dataset, normalizer, MatchPolicy::default(), 0);
        let result = matched(m.match_segment("hello"));
        assert_eq!(result.pattern.group_key, "smalltalk_0");
        assert_eq!(m.cached_segments(), 0);
    }

    #[test]
    fn results_are_memoized_per_normalized_segment() {
        let m = matcher();
        m.match_segment("Открой браузер");
        m.match_segment("открой браузер!!");
        m.match_segment("джарвис открой браузер");
        assert_eq!(m.cached_segments(), 1);

        let fresh = m.with_dataset(Arc::clone(m.dataset()));
        assert_eq!(fresh.cached_segments(), 0);
    }

    #[test]
    fn cache_is_bounded() {
        let dataset = Arc::new(Dataset::from_toml_str(CATALOG).unwrap());
        let normalizer = Arc::new(Normalizer::from_config(&AssistantConfig::default()).unwrap());
        let m = IntentMatcher::new(dataset, normalizer, MatchPolicy::default(), 2);
        for seg in ["один", "два", "три"] {
            m.match_segment(seg);
        }
        assert!(m.cached_segments() <= 2);
    }

    #[test]
    fn empty_catalog_never_matches() {
        let normalizer = Arc::new(Normalizer::from_config(&AssistantConfig::default()).unwrap());
        let m = IntentMatcher::new(
            Arc::new(Dataset::default()),
            normalizer,
            MatchPolicy::default(),
            8,
        );
        assert!(matches!(
            m.match_segment("привет"),
            MatchOutcome::NoMatch { .. }
        ));
    }
}
