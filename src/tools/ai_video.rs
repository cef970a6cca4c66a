use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conversation::{Assistant, ConversationState, Session, TranscriptMessage};
use crate::error::Result;
use crate::video::VideoOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoAction {
    Request,
    Status,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AiVideoParams {
    /// "request" starts generation, "status" checks on it
    pub action: VideoAction,
}

#[derive(Debug, Serialize)]
pub struct AiVideoResult {
    pub state: ConversationState,
    pub messages: Vec<TranscriptMessage>,
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VideoOutcome>,
}

pub fn ai_video_impl(
    assistant: &Assistant,
    session: &mut Session,
    params: AiVideoParams,
) -> Result<AiVideoResult> {
    let messages = match params.action {
        VideoAction::Request => assistant.request_video(session)?,
        VideoAction::Status => assistant.poll_video(session)?,
    };
    let outcome = assistant.video_outcome(session);

    Ok(AiVideoResult {
        state: session.state(),
        messages,
        pending: session.state() == ConversationState::VideoRequested,
        outcome,
    })
}
