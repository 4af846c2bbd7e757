//! Error types for the jarvis command pipeline.

/// Top-level error type for the assistant core.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Pattern catalog could not be loaded or failed validation.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Skill registry construction error.
    #[error("skill error: {0}")]
    Skill(String),

    /// Pipeline coordination error.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
