//! Async workers that carry utterances from the recognizer to speech output.

pub mod coordinator;
pub mod messages;
