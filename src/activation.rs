//! Wake-word activation gate.
//!
//! The assistant sleeps until it hears a wake phrase (spoken inside an
//! utterance, or signalled by an external spotter), then treats every
//! utterance as a command until `timeout` passes without activity.
//!
//! Expiry is lazy: it is checked when an utterance, wake signal or tick
//! arrives, never by a timer of its own. Every method takes the current
//! [`Instant`] so callers and tests control the clock.

use crate::config::AssistantConfig;
use crate::text::WakeWords;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Whether the assistant is listening for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for a wake phrase.
    Dormant,
    /// Inside the active window.
    Active,
}

/// Mutable activation bookkeeping, owned by a single [`ActivationGate`].
#[derive(Debug, Clone)]
pub struct ActivationState {
    /// True inside the active window.
    pub is_active: bool,
    /// Last wake or accepted utterance.
    pub last_activity: Instant,
    /// Length of the active window.
    pub timeout: Duration,
    /// Last detected utterance language.
    pub language: String,
}

impl ActivationState {
    /// A dormant state.
    pub fn new(timeout: Duration, language: impl Into<String>, now: Instant) -> Self {
        Self {
            is_active: false,
            last_activity: now,
            timeout,
            language: language.into(),
        }
    }

    /// Current state, without applying expiry.
    pub fn state(&self) -> GateState {
        if self.is_active {
            GateState::Active
        } else {
            GateState::Dormant
        }
    }

    /// True when active and more than `timeout` has passed since the last activity.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.is_active && now.saturating_duration_since(self.last_activity) > self.timeout
    }
}

/// What the gate decided about one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Dormant and no wake phrase: drop the utterance silently.
    Ignore,
    /// A wake phrase woke the assistant and nothing else was said.
    Acknowledge,
    /// A wake phrase was repeated inside the active window with nothing else.
    StillListening,
    /// Command text with wake phrases removed, ready for the executor.
    Forward(String),
}

/// Dormant/Active state machine in front of the executor.
#[derive(Debug, Clone)]
pub struct ActivationGate {
    wake_words: WakeWords,
    state: ActivationState,
}

impl ActivationGate {
    /// A dormant gate.
    pub fn new(
        wake_words: WakeWords,
        timeout: Duration,
        language: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            wake_words,
            state: ActivationState::new(timeout, language, now),
        }
    }

    /// A dormant gate using the `[assistant]` timeout and default language.
    pub fn from_config(config: &AssistantConfig, wake_words: WakeWords, now: Instant) -> Self {
        Self::new(
            wake_words,
            Duration::from_secs(u64::from(config.assistant.active_timeout_s)),
            config.assistant.default_language.clone(),
            now,
        )
    }

    /// Current state, without applying expiry.
    pub fn state(&self) -> GateState {
        self.state.state()
    }

    /// Whether the gate is inside the active window.
    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    /// Read-only view of the bookkeeping.
    pub fn activation(&self) -> &ActivationState {
        &self.state
    }

    /// Sticky language of the conversation.
    pub fn language(&self) -> &str {
        &self.state.language
    }

    /// Record the recognizer's language tag. Empty tags keep the previous language.
    pub fn observe_language(&mut self, language: &str) {
        let language = language.trim();
        if !language.is_empty() && language != self.state.language {
            debug!(from = %self.state.language, to = %language, "utterance language changed");
            self.state.language = language.to_owned();
        }
    }

    /// Apply lazy expiry. Returns true if the gate just went dormant.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state.is_expired(now) {
            self.state.is_active = false;
            info!(
                idle_s = now
                    .saturating_duration_since(self.state.last_activity)
                    .as_secs(),
                "active window elapsed, returning to dormant"
            );
            true
        } else {
            false
        }
    }

    /// External wake signal. Returns true if it woke a dormant gate; an
    /// active gate only has its window refreshed.
    pub fn on_wake_signal(&mut self, now: Instant) -> bool {
        self.tick(now);
        let woke = !self.state.is_active;
        self.activate(now);
        if woke {
            info!("wake signal received, transitioning to active");
        } else {
            debug!("wake signal while active, window refreshed");
        }
        woke
    }

    /// Gate one non-empty recognized utterance.
    pub fn on_utterance(&mut self, text: &str, language: &str, now: Instant) -> GateDecision {
        self.observe_language(language);
        self.tick(now);

        if self.state.is_active {
            self.state.last_activity = now;
            let residual = self.wake_words.strip(text);
            if residual.is_empty() {
                debug!("wake phrase repeated inside active window");
                return GateDecision::StillListening;
            }
            return GateDecision::Forward(residual);
        }

        if !self.wake_words.contains(text) {
            debug!(text = %text, "dormant, no wake phrase, ignoring");
            return GateDecision::Ignore;
        }

        self.activate(now);
        let residual = self.wake_words.strip(text);
        info!(residual = %residual, "wake phrase heard, transitioning to active");
        if residual.is_empty() {
            GateDecision::Acknowledge
        } else {
            GateDecision::Forward(residual)
        }
    }

    fn activate(&mut self, now: Instant) {
        self.state.is_active = true;
        self.state.last_activity = now;
    }
}
