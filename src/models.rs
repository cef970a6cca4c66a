use serde::{Deserialize, Serialize};

// Chat message format (OpenAI-compatible)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// Either a plain string or a list of typed parts (needed for images)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the message, ignoring image parts
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

// Chat completion request format
#[derive(Debug, Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i32>,
}

impl ChatRequest {
    pub fn single(model: &str, message: ChatMessage) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![message],
            temperature: None,
            max_tokens: None,
        }
    }
}

// Chat completion response format
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Text of the first choice, empty when the model returned nothing
    pub fn first_text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn with_text(text: &str) -> Self {
        Self {
            choices: vec![Choice {
                message: AssistantMessage {
                    role: Some("assistant".to_string()),
                    content: Some(text.to_string()),
                },
            }],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Choice {
    pub message: AssistantMessage,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

// Video generation submission
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct VideoGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub ratio: String,
    pub duration: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VideoGenerationResponse {
    #[serde(default, alias = "generation_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VideoStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub video: Option<VideoAsset>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl VideoStatusResponse {
    pub fn url(&self) -> Option<String> {
        self.video
            .as_ref()
            .and_then(|v| v.url.clone())
            .or_else(|| self.video_url.clone())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VideoAsset {
    #[serde(default)]
    pub url: Option<String>,
}
