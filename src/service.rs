use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{CallToolResult, Content, ErrorData, ServerCapabilities, ServerInfo},
};
use rmcp_macros::{tool, tool_handler, tool_router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::conversation::{Assistant, Session};
use crate::tools::ai_meal::{
    AiCheckParams, AiCluesParams, AiImageParams, AiInputParams, AiResetParams, ai_check_impl,
    ai_clues_impl, ai_image_impl, ai_input_impl, ai_reset_impl,
};
use crate::tools::ai_profile::{AiProfileParams, ai_profile_impl};
use crate::tools::ai_video::{AiVideoParams, ai_video_impl};

/// MCP server exposing the meal-inspection conversation as tools.
#[derive(Clone)]
pub struct InspectorService {
    tool_router: ToolRouter<Self>,
    assistant: Arc<Assistant>,
    session: Arc<Mutex<Session>>,
    config: Arc<Config>,
    local_paths: bool,
}

impl InspectorService {
    pub fn new(config: Arc<Config>, assistant: Arc<Assistant>) -> Self {
        let session = Session::new();
        tracing::info!("Service::new() - session {}", session.id);
        Self {
            tool_router: Self::tool_router(),
            assistant,
            session: Arc::new(Mutex::new(session)),
            config,
            local_paths: true,
        }
    }

    /// Refuse `image_path` so remote clients cannot read server files.
    pub fn without_local_paths(mut self) -> Self {
        self.local_paths = false;
        self
    }

    /// Same clients, new conversation. Used once per HTTP MCP session.
    pub fn fresh_session(&self) -> Self {
        Self {
            local_paths: self.local_paths,
            ..Self::new(Arc::clone(&self.config), Arc::clone(&self.assistant))
        }
    }
}

fn respond<T: Serialize>(
    tool: &str,
    result: crate::error::Result<T>,
) -> std::result::Result<CallToolResult, ErrorData> {
    match result {
        Ok(response) => {
            let content = Content::json(response).map_err(|e| {
                ErrorData::internal_error(format!("Failed to create JSON content: {e}"), None)
            })?;
            Ok(CallToolResult::success(vec![content]))
        }
        Err(e) if e.is_user_error() => {
            tracing::warn!("{} rejected: {}", tool, e);
            Err(ErrorData::invalid_params(e.to_string(), None))
        }
        Err(e) => {
            tracing::error!("{} error: {}", tool, e);
            Err(ErrorData::internal_error(e.to_string(), None))
        }
    }
}

#[tool_router]
impl InspectorService {
    #[tool(
        description = "Manage the user profile. action: update (name, description, avatar_url, allergies; a new description is analyzed for allergies), confirm, edit or show."
    )]
    pub async fn ai_profile(
        &self,
        params: Parameters<AiProfileParams>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let mut session = self.session.lock().await;
        respond(
            "ai_profile",
            ai_profile_impl(&self.assistant, &mut session, params.0).await,
        )
    }

    #[tool(description = "Choose how the meal picture will be provided: camera or upload.")]
    pub async fn ai_input(
        &self,
        params: Parameters<AiInputParams>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let mut session = self.session.lock().await;
        respond(
            "ai_input",
            ai_input_impl(&self.assistant, &mut session, params.0),
        )
    }

    #[tool(
        description = "Submit the meal picture (exactly one of image_base64, image_url, or image_path over stdio) and get the detected ingredients."
    )]
    pub async fn ai_image(
        &self,
        params: Parameters<AiImageParams>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let mut session = self.session.lock().await;
        respond(
            "ai_image",
            ai_image_impl(&self.assistant, &mut session, params.0, self.local_paths).await,
        )
    }

    #[tool(description = "Type the foods or ingredients instead of sending a picture.")]
    pub async fn ai_clues(
        &self,
        params: Parameters<AiCluesParams>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let mut session = self.session.lock().await;
        respond(
            "ai_clues",
            ai_clues_impl(&self.assistant, &mut session, params.0),
        )
    }

    #[tool(
        description = "Cross-check the detected ingredients against the profile allergies. Returns dangerous/alert/safe cards."
    )]
    pub async fn ai_check(
        &self,
        params: Parameters<AiCheckParams>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let mut session = self.session.lock().await;
        respond(
            "ai_check",
            ai_check_impl(&self.assistant, &mut session, params.0).await,
        )
    }

    #[tool(
        description = "Educational video about the allergies. action: request starts generation in the background, status checks on it."
    )]
    pub async fn ai_video(
        &self,
        params: Parameters<AiVideoParams>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let mut session = self.session.lock().await;
        respond(
            "ai_video",
            ai_video_impl(&self.assistant, &mut session, params.0),
        )
    }

    #[tool(description = "Start over with another meal. The profile is kept.")]
    pub async fn ai_reset(
        &self,
        params: Parameters<AiResetParams>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let mut session = self.session.lock().await;
        respond(
            "ai_reset",
            ai_reset_impl(&self.assistant, &mut session, params.0),
        )
    }
}

#[tool_handler]
impl ServerHandler for InspectorService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::V_2024_11_05,
            server_info: rmcp::model::Implementation {
                name: self.config.server.name.clone(),
                version: self.config.server.version.clone(),
            },
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                ..Default::default()
            },
            instructions: Some(
                "Allergy Inspector: set up a profile with ai_profile, then ai_input, ai_image \
                 (or ai_clues), ai_check, optionally ai_video, and ai_reset for the next meal."
                    .into(),
            ),
        }
    }
}
