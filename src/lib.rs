pub mod assessment;
pub mod config;
pub mod conversation;
pub mod crosscheck;
pub mod error;
pub mod inference;
pub mod ingredients;
pub mod media;
pub mod models;
pub mod profile;
pub mod prompts;
pub mod service;
pub mod tools;
pub mod transport;
pub mod video;

use std::sync::Arc;

use crate::config::Config;
use crate::conversation::Assistant;
use crate::crosscheck::CrossChecker;
use crate::error::Result;
use crate::inference::ModelAllergyInference;
use crate::ingredients::IngredientDetector;
use crate::prompts::PromptSet;
use crate::transport::{HttpTransport, Transport};
use crate::video::{HttpVideoApi, VideoGenerator};

/// Wire the hosted-model clients from configuration and loaded prompts.
pub fn build_assistant(cfg: &Config, prompts: PromptSet) -> Result<Assistant> {
    let transport = Arc::new(HttpTransport::new(
        &cfg.chat.base_url,
        cfg.chat.api_key.clone(),
        cfg.request_timeout(),
    )?);

    let detector = IngredientDetector::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        cfg.chat.vision_model.clone(),
        prompts.ingredients,
    );
    let checker = CrossChecker::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        cfg.chat.text_model.clone(),
        prompts.cross_check,
    );
    let inference = ModelAllergyInference::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        cfg.chat.text_model.clone(),
        prompts.infer_allergy,
    );

    let video_api = HttpVideoApi::new(
        &cfg.video.base_url,
        cfg.video.api_key.clone(),
        cfg.request_timeout(),
    )?;
    let video = VideoGenerator::new(Arc::new(video_api), cfg, prompts.video);

    Ok(Assistant::new(
        detector,
        checker,
        Arc::new(inference),
        Arc::new(video),
    ))
}
