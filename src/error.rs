use thiserror::Error;

use crate::conversation::ConversationState;

pub type Result<T> = std::result::Result<T, InspectorError>;

#[derive(Debug, Error)]
pub enum InspectorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt file error at {path}: {reason}")]
    Prompt { path: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Cannot {event} while {from}")]
    InvalidTransition {
        from: ConversationState,
        event: &'static str,
    },

    #[error("Media error: {0}")]
    Media(String),

    #[error("Profile is confirmed; choose edit before changing it")]
    ProfileLocked,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InspectorError {
    /// Errors caused by the caller rather than by a collaborator.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            InspectorError::InvalidTransition { .. }
                | InspectorError::Media(_)
                | InspectorError::ProfileLocked
        )
    }
}

impl From<reqwest::Error> for InspectorError {
    fn from(e: reqwest::Error) -> Self {
        InspectorError::Transport(e.to_string())
    }
}
