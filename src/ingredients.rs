use indexmap::IndexSet;
use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::error::Result;
use crate::media::ImageInput;
use crate::models::{ChatMessage, ChatRequest, ContentPart, ImageUrl};
use crate::transport::Transport;

/// Lower-cased, de-duplicated ingredient names in the order first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedIngredients(IndexSet<String>);

impl DetectedIngredients {
    /// Split free text on commas and newlines, dropping list decoration.
    pub fn from_text(text: &str) -> Self {
        let items = text
            .split([',', '\n', ';'])
            .map(clean_item)
            .filter(|item| !item.is_empty())
            .collect();
        Self(items)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }
}

impl Serialize for DetectedIngredients {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

fn clean_item(raw: &str) -> String {
    let mut item = raw.trim().trim_start_matches(['-', '*', '•']).trim_start();
    // "1." / "2)" numbering
    if let Some(pos) = item.find(['.', ')']) {
        if pos > 0 && item[..pos].chars().all(|c| c.is_ascii_digit()) {
            item = &item[pos + 1..];
        }
    }
    item.trim()
        .trim_end_matches('.')
        .trim_matches(['"', '\'', '[', ']'])
        .trim()
        .to_lowercase()
}

/// Vision client: image in, ingredient list out.
pub struct IngredientDetector {
    tx: Arc<dyn Transport>,
    model: String,
    prompt: String,
}

impl IngredientDetector {
    pub fn new(tx: Arc<dyn Transport>, model: String, prompt: String) -> Self {
        Self { tx, model, prompt }
    }

    /// Ask the vision model for the ingredients in `image`.
    pub async fn try_detect(&self, image: &ImageInput) -> Result<DetectedIngredients> {
        tracing::info!("Detecting ingredients in {}", image.describe());

        let message = ChatMessage::user_parts(vec![
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.to_model_url(),
                },
            },
            ContentPart::Text {
                text: self.prompt.clone(),
            },
        ]);
        let request = ChatRequest::single(&self.model, message);

        let response = self.tx.chat(&request).await?;
        let detected = DetectedIngredients::from_text(&response.first_text());
        tracing::info!("Detected {} ingredients", detected.len());
        Ok(detected)
    }

    /// Like [`try_detect`](Self::try_detect) but any failure yields an empty list.
    pub async fn detect(&self, image: &ImageInput) -> DetectedIngredients {
        match self.try_detect(image).await {
            Ok(detected) => detected,
            Err(e) => {
                tracing::warn!("Ingredient detection failed: {}", e);
                DetectedIngredients::default()
            }
        }
    }
}
