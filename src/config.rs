use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{InspectorError, Result};

/// Main configuration structure for the allergy inspector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub video: VideoConfig,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

/// OpenAI-compatible endpoint used for vision and text calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub ratio: String,
    pub duration: String,
    /// Fixed pause between two status queries
    pub wait_seconds: u64,
    pub max_attempts: usize,
    /// Ceiling on total time spent polling one job
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Resolved against the working directory when relative
    pub dir: PathBuf,
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    ///
    /// Missing API keys and unreadable config files are fatal.
    pub fn load() -> Result<Self> {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!("No .env file found - continuing with env vars only");
        }

        let config_path = env::var("AI_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            let contents = fs::read_to_string(&config_path).map_err(|e| {
                InspectorError::Config(format!("Failed to read config file {config_path}: {e}"))
            })?;
            let config = serde_yaml::from_str::<Config>(&contents).map_err(|e| {
                InspectorError::Config(format!("Failed to parse config file {config_path}: {e}"))
            })?;
            tracing::info!("Loaded configuration from {}", config_path);
            config
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("AI_SERVER_NAME") {
            self.server.name = name;
        }

        if let Ok(api_key) = env::var("AIML_API_KEY") {
            self.chat.api_key = api_key;
        }
        if let Ok(base_url) = env::var("AI_CHAT_BASE_URL") {
            self.chat.base_url = base_url;
        }
        if let Ok(model) = env::var("AI_VISION_MODEL") {
            self.chat.vision_model = model;
        }
        if let Ok(model) = env::var("AI_TEXT_MODEL") {
            self.chat.text_model = model;
        }

        if let Ok(api_key) = env::var("VIDEO_API_KEY") {
            self.video.api_key = api_key;
        }
        if let Ok(base_url) = env::var("AI_VIDEO_BASE_URL") {
            self.video.base_url = base_url;
        }
        if let Ok(model) = env::var("AI_VIDEO_MODEL") {
            self.video.model = model;
        }
        if let Ok(wait) = env::var("AI_VIDEO_WAIT_SECONDS") {
            if let Ok(secs) = wait.parse() {
                self.video.wait_seconds = secs;
            }
        }
        if let Ok(attempts) = env::var("AI_VIDEO_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.video.max_attempts = n;
            }
        }
        if let Ok(timeout) = env::var("AI_VIDEO_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.video.timeout_seconds = secs;
            }
        }

        if let Ok(dir) = env::var("AI_PROMPTS_DIR") {
            self.prompts.dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chat.api_key.trim().is_empty() {
            return Err(InspectorError::Config(
                "AIML_API_KEY environment variable must be set".into(),
            ));
        }
        if self.video.api_key.trim().is_empty() {
            return Err(InspectorError::Config(
                "VIDEO_API_KEY environment variable must be set".into(),
            ));
        }
        if self.video.wait_seconds == 0 {
            return Err(InspectorError::Config(
                "video.wait_seconds cannot be 0".into(),
            ));
        }
        if self.video.max_attempts == 0 {
            return Err(InspectorError::Config(
                "video.max_attempts cannot be 0".into(),
            ));
        }
        if self.video.timeout_seconds < self.video.wait_seconds {
            return Err(InspectorError::Config(format!(
                "video.timeout_seconds ({}) must be at least video.wait_seconds ({})",
                self.video.timeout_seconds, self.video.wait_seconds
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.request_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.video.wait_seconds)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.video.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "allergy-inspector".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            chat: ChatConfig {
                api_key: String::new(),
                base_url: "https://api.aimlapi.com/v1".to_string(),
                vision_model: "rhymes-ai/aria".to_string(),
                text_model: "rhymes-ai/aria".to_string(),
                request_timeout_seconds: 60,
            },
            video: VideoConfig {
                api_key: String::new(),
                base_url: "https://api.aimlapi.com/v2/generate/video/kling".to_string(),
                model: "kling-video/v1/standard/text-to-video".to_string(),
                ratio: "16:9".to_string(),
                duration: "5".to_string(),
                wait_seconds: 10,
                max_attempts: 60,
                timeout_seconds: 600,
            },
            prompts: PromptsConfig {
                dir: PathBuf::from("prompts"),
            },
        }
    }
}
