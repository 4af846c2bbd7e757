//! Jarvis: wake-word voice command assistant core.
//!
//! Recognized text flows through:
//! Activation gate → Segmenter → Intent matcher → Executor → Speech output
//!
//! # Architecture
//!
//! - **Activation**: dormant until a wake phrase is heard, then active for a
//!   configurable window that every utterance refreshes
//! - **Text**: normalization (case, punctuation, wake phrases, fillers) and
//!   splitting one utterance into several commands
//! - **Matcher**: fuzzy matching against a pattern catalog with tiered
//!   acceptance thresholds
//! - **Executor**: runs the bound skill or picks the catalog response and
//!   joins per-command replies
//! - **Pipeline**: tokio workers for the recognizer feed, dispatch and speech
//!   output
//!
//! Audio capture, speech recognition and synthesis stay outside the crate;
//! they meet it as [`pipeline::messages::Utterance`] in and
//! [`pipeline::coordinator::SpeechSink`] out.

pub mod activation;
pub mod config;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod pipeline;
pub mod session;
pub mod skills;
pub mod text;

pub use activation::{ActivationGate, ActivationState, GateDecision, GateState};
pub use config::AssistantConfig;
pub use dataset::{Category, Dataset, DatasetSource, FileDatasetSource, PatternEntry, Response};
pub use error::{AssistantError, Result};
pub use executor::{Executor, FallbackResponder};
pub use matcher::{IntentMatcher, MatchOutcome, MatchPolicy, MatchResult, MatchTier};
pub use pipeline::coordinator::{PipelineCoordinator, SpeechSink};
pub use pipeline::messages::{Reply, Utterance, WakeSignal};
pub use session::Session;
pub use skills::{SkillContext, SkillError, SkillFactory, SkillHandler, SkillRegistry};
