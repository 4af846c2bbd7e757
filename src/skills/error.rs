//! Error types for skill invocation.

/// Errors a skill invocation can end in.
///
/// None of these reach the user: the executor logs them and speaks the
/// matched entry's template response instead.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// No handler is registered for the action.
    #[error("no handler registered for action {action}")]
    UnknownAction {
        /// The action identifier that was looked up.
        action: String,
    },

    /// The handler ran and reported a failure.
    #[error("skill {action} failed: {message}")]
    Failed {
        /// The action identifier.
        action: String,
        /// Handler-provided description.
        message: String,
    },

    /// The handler did not finish in time.
    #[error("skill {action} timed out after {timeout_secs}s")]
    Timeout {
        /// The action identifier.
        action: String,
        /// The timeout duration in seconds.
        timeout_secs: u64,
    },

    /// The handler panicked.
    #[error("skill {action} panicked")]
    Panicked {
        /// The action identifier.
        action: String,
    },
}

impl SkillError {
    /// Shorthand for [`SkillError::Failed`].
    pub fn failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Action identifier the error belongs to.
    pub fn action(&self) -> &str {
        match self {
            Self::UnknownAction { action }
            | Self::Failed { action, .. }
            | Self::Timeout { action, .. }
            | Self::Panicked { action } => action,
        }
    }
}

impl From<SkillError> for crate::error::AssistantError {
    fn from(err: SkillError) -> Self {
        Self::Skill(err.to_string())
    }
}
