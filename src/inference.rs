use async_trait::async_trait;
use indexmap::IndexSet;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ChatMessage, ChatRequest};
use crate::prompts::fill;
use crate::transport::Transport;

const STRICT_RETRY_INSTRUCTION: &str = "Reply with ONLY a JSON array of lowercase allergen strings, \
for example [\"gluten\", \"shrimp\"]. Do not write [noone], none, or any other text. \
Make your best guess from the description.";

const SENTINELS: [&str; 3] = ["", "none", "noone"];

#[async_trait]
pub trait AllergyInference: Send + Sync {
    /// Allergens suggested by a free-text description, lower-cased.
    async fn infer(&self, description: &str) -> Result<Vec<String>>;
}

pub struct ModelAllergyInference {
    tx: Arc<dyn Transport>,
    model: String,
    template: String,
}

impl ModelAllergyInference {
    pub fn new(tx: Arc<dyn Transport>, model: String, template: String) -> Self {
        Self {
            tx,
            model,
            template,
        }
    }

    async fn ask(&self, prompt: String) -> Result<String> {
        let request = ChatRequest::single(&self.model, ChatMessage::user_text(prompt));
        Ok(self.tx.chat(&request).await?.first_text())
    }
}

#[async_trait]
impl AllergyInference for ModelAllergyInference {
    async fn infer(&self, description: &str) -> Result<Vec<String>> {
        let description = description.trim();
        if description.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!("Inferring allergies from description ({} chars)", description.len());

        let prompt = fill(&self.template, &[("description", description)]);
        let mut reply = self.ask(prompt.clone()).await?;

        if is_empty_reply(&reply) {
            tracing::info!("Allergy inference returned no allergens, retrying with strict prompt");
            reply = self
                .ask(format!("{prompt}\n\n{STRICT_RETRY_INSTRUCTION}"))
                .await?;
        }

        let allergens = parse_allergen_reply(&reply);
        tracing::info!("Inferred allergens: {:?}", allergens);
        Ok(allergens)
    }
}

/// `[noone]`, `none` or nothing at all, ignoring quotes and trailing punctuation.
pub fn is_empty_reply(reply: &str) -> bool {
    let normalized = normalize_token(reply);
    normalized.is_empty() || normalized == "none" || normalized == "noone"
}

/// Lower-cased token without surrounding brackets, quotes, backticks or
/// sentence punctuation.
fn normalize_token(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['.', '!', ';', ':'])
        .trim_matches(['[', ']', '"', '\'', '`'])
        .trim_end_matches(['.', '!', ';', ':'])
        .trim()
        .to_lowercase()
}

/// JSON array first, comma split as fallback. Output is lower-cased,
/// de-duplicated and free of sentinel words.
pub fn parse_allergen_reply(reply: &str) -> Vec<String> {
    let raw: Vec<String> = json_array(reply).unwrap_or_else(|| {
        reply
            .split([',', '\n'])
            .map(|item| item.to_string())
            .collect()
    });

    raw.iter()
        .map(|item| normalize_token(item))
        .filter(|item| !SENTINELS.iter().any(|s| *s == item.as_str()))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn json_array(reply: &str) -> Option<Vec<String>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Vec<String>>(&reply[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InspectorError;
    use crate::models::ChatResponse;
    use crate::transport::MockTransport;
    use std::sync::Mutex;

    // Replays canned replies in order and records every prompt it saw
    struct ScriptedTransport {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
            self.prompts
                .lock()
                .expect("prompt log mutex should not be poisoned")
                .push(req.messages[0].content.text());
            let next = self
                .replies
                .lock()
                .expect("reply mutex should not be poisoned")
                .pop();
            match next {
                Some(reply) => Ok(ChatResponse::with_text(&reply)),
                None => Err(InspectorError::Internal("No more scripted replies".to_string())),
            }
        }
    }

    fn inference(tx: Arc<dyn Transport>) -> ModelAllergyInference {
        ModelAllergyInference::new(tx, "text-model".to_string(), "Text: {description}".to_string())
    }

    #[tokio::test]
    async fn test_json_reply_is_lowercased() {
        let tx = Arc::new(ScriptedTransport::new(&[r#"["Wheat","Shrimp"]"#]));
        let out = inference(tx.clone())
            .infer("I get sick from bread and shrimp")
            .await
            .unwrap();
        assert_eq!(out, vec!["wheat", "shrimp"]);
        assert_eq!(
            tx.prompts.lock().unwrap().as_slice(),
            ["Text: I get sick from bread and shrimp"]
        );
    }

    #[tokio::test]
    async fn test_none_reply_retries_once_with_strict_prompt() {
        let tx = Arc::new(ScriptedTransport::new(&["none", r#"["gluten"]"#]));
        let out = inference(tx.clone()).infer("bread hurts").await.unwrap();
        assert_eq!(out, vec!["gluten"]);

        let prompts = tx.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("ONLY a JSON array"));
    }

    #[tokio::test]
    async fn test_retry_still_empty_gives_empty_list() {
        let tx = Arc::new(ScriptedTransport::new(&["[noone]", "[noone]"]));
        let out = inference(tx.clone()).infer("nothing really").await.unwrap();
        assert!(out.is_empty());
        assert_eq!(tx.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_description_skips_model() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(0);
        let out = inference(Arc::new(mock)).infer("   ").await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_comma_fallback() {
        assert_eq!(
            parse_allergen_reply("Peanuts, 'Milk', peanuts\nEggs"),
            vec!["peanuts", "milk", "eggs"]
        );
    }

    #[test]
    fn test_json_inside_code_fence() {
        assert_eq!(
            parse_allergen_reply("```json\n[\"Dairy\", \"soy\"]\n```"),
            vec!["dairy", "soy"]
        );
    }

    #[test]
    fn test_unquoted_array_falls_back_to_split() {
        assert_eq!(parse_allergen_reply("[gluten, shrimp]"), vec!["gluten", "shrimp"]);
    }

    #[test]
    fn test_punctuated_sentinels_are_dropped() {
        assert!(parse_allergen_reply("None.").is_empty());
        assert!(parse_allergen_reply("\"none\"").is_empty());
        assert_eq!(parse_allergen_reply("gluten, none."), vec!["gluten"]);
        assert_eq!(parse_allergen_reply("Peanuts."), vec!["peanuts"]);
    }

    #[tokio::test]
    async fn test_punctuated_none_triggers_strict_retry() {
        let tx = Arc::new(ScriptedTransport::new(&["None.", r#"["sesame"]"#]));
        let out = inference(tx.clone()).infer("tahini burns").await.unwrap();
        assert_eq!(out, vec!["sesame"]);
        assert_eq!(tx.prompts.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_reply_detection() {
        assert!(is_empty_reply("  [NoOne] "));
        assert!(is_empty_reply("None"));
        assert!(is_empty_reply(""));
        assert!(is_empty_reply("None."));
        assert!(is_empty_reply("\"none\""));
        assert!(!is_empty_reply("[\"milk\"]"));
    }
}
