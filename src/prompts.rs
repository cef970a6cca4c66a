use std::fs;
use std::path::Path;

use crate::error::{InspectorError, Result};

pub const INGREDIENTS_PROMPT_FILE: &str = "ingredients_prompt.txt";
pub const CROSS_CHECK_PROMPT_FILE: &str = "crossing_data_prompt.txt";
pub const INFER_ALLERGY_PROMPT_FILE: &str = "infer_allergy_prompt.txt";
pub const VIDEO_PROMPT_FILE: &str = "prepare_video_prompt.txt";

/// Instruction templates for every model call, loaded once at start-up.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub ingredients: String,
    pub cross_check: String,
    pub infer_allergy: String,
    pub video: String,
}

impl PromptSet {
    /// Read all four templates from `dir`. A missing or empty file is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        tracing::info!("Loading prompt templates from {}", dir.display());
        Ok(Self {
            ingredients: load_prompt(&dir.join(INGREDIENTS_PROMPT_FILE))?,
            cross_check: load_prompt(&dir.join(CROSS_CHECK_PROMPT_FILE))?,
            infer_allergy: load_prompt(&dir.join(INFER_ALLERGY_PROMPT_FILE))?,
            video: load_prompt(&dir.join(VIDEO_PROMPT_FILE))?,
        })
    }
}

pub fn load_prompt(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).map_err(|e| InspectorError::Prompt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Err(InspectorError::Prompt {
            path: path.display().to_string(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(text.to_string())
}

/// Substitute `{name}` placeholders in one pass over the template, so
/// substituted values are never expanded again. Unknown placeholders are
/// left as-is.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
