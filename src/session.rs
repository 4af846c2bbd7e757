//! One conversation: activation gate and executor.
//!
//! A [`Session`] is owned by the single dispatch worker, so none of its state
//! needs synchronization.

use crate::activation::{ActivationGate, GateDecision, GateState};
use crate::config::{AssistantConfig, LocalizedText};
use crate::executor::Executor;
use crate::pipeline::messages::{Reply, Utterance};
use std::time::Instant;
use tracing::{debug, info};

/// Gate + executor.
pub struct Session {
    gate: ActivationGate,
    executor: Executor,
}

impl Session {
    /// A dormant session around `executor`, recognizing the same wake phrases
    /// its normalizer strips.
    pub fn new(config: &AssistantConfig, executor: Executor, now: Instant) -> Self {
        let wake_words = executor.matcher().normalizer().wake_words().clone();
        Self {
            gate: ActivationGate::from_config(config, wake_words, now),
            executor,
        }
    }

    /// A session with an explicitly built gate.
    pub fn with_gate(gate: ActivationGate, executor: Executor) -> Self {
        Self { gate, executor }
    }

    /// Activation gate.
    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }

    /// Executor.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Mutable executor, for reloads driven from outside an utterance.
    pub fn executor_mut(&mut self) -> &mut Executor {
        &mut self.executor
    }

    /// Current state, without applying expiry.
    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    /// Handle one recognized turn. Returns the reply to speak, or `None` when
    /// the utterance is ignored.
    ///
    /// Empty text is the recognizer's "nothing heard" prompt: it is logged
    /// and produces no reply.
    pub fn handle_utterance(&mut self, utterance: &Utterance, now: Instant) -> Option<Reply> {
        if utterance.is_empty() {
            info!("nothing heard");
            return None;
        }

        match self.gate.on_utterance(&utterance.text, &utterance.language, now) {
            GateDecision::Ignore => None,
            GateDecision::Acknowledge => Some(self.canned(&self.executor.responses().acknowledge)),
            GateDecision::StillListening => Some(self.canned(&self.executor.responses().listening)),
            GateDecision::Forward(command) => {
                let language = self.gate.language().to_owned();
                let text = self.executor.handle(&command, &language);
                debug!(command = %command, reply = %text, "utterance handled");
                Some(Reply::new(text, language))
            }
        }
    }

    /// External wake signal. A dormant session acknowledges it; an active one
    /// only refreshes its window.
    pub fn handle_wake_signal(&mut self, now: Instant) -> Option<Reply> {
        if self.gate.on_wake_signal(now) {
            Some(self.canned(&self.executor.responses().acknowledge))
        } else {
            None
        }
    }

    /// Periodic expiry check.
    pub fn tick(&mut self, now: Instant) {
        self.gate.tick(now);
    }

    fn canned(&self, text: &LocalizedText) -> Reply {
        let language = self.gate.language();
        Reply::new(
            text.resolve(language, self.executor.base_language()),
            language,
        )
    }
}
