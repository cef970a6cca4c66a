use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyStatus {
    Dangerous,
    Alert,
    Safe,
}

impl SafetyStatus {
    /// Unknown words fall back to `Alert` rather than `Safe`.
    pub fn from_word(word: &str) -> Self {
        match word.trim().to_lowercase().as_str() {
            "dangerous" => SafetyStatus::Dangerous,
            "safe" => SafetyStatus::Safe,
            "alert" => SafetyStatus::Alert,
            other => {
                tracing::debug!("Unrecognized safety status '{}', treating as alert", other);
                SafetyStatus::Alert
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SafetyStatus::Dangerous => "DANGEROUS",
            SafetyStatus::Alert => "ALERT",
            SafetyStatus::Safe => "SAFE",
        }
    }

    /// Card color used by renderers.
    pub fn color_hex(&self) -> &'static str {
        match self {
            SafetyStatus::Dangerous => "#ff6961",
            SafetyStatus::Alert => "#FFD700",
            SafetyStatus::Safe => "#77DD77",
        }
    }
}

impl fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classified ingredient from a cross-check reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientAssessment {
    pub status: SafetyStatus,
    pub emoji: String,
    pub ingredient: String,
    pub description: String,
}

impl IngredientAssessment {
    /// Markdown card: `🍤 shrimp (DANGEROUS)` followed by the description.
    pub fn card(&self) -> String {
        format!(
            "{} **{}** ({})\n{}",
            self.emoji,
            self.ingredient,
            self.status.label(),
            self.description
        )
    }
}

/// Parse `[status, emoji, ingredient, "description"]`.
///
/// Splits on the first three commas so the description may contain commas.
/// Returns `None` for anything with fewer than four fields.
pub fn parse_assessment(line: &str) -> Option<IngredientAssessment> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    let mut fields = inner.splitn(4, ',');
    let status = fields.next()?.trim();
    let emoji = fields.next()?.trim();
    let ingredient = fields.next()?.trim();
    let description = fields.next()?.replace('"', "");

    if status.is_empty() || ingredient.is_empty() {
        return None;
    }

    Some(IngredientAssessment {
        status: SafetyStatus::from_word(status),
        emoji: emoji.to_string(),
        ingredient: ingredient.to_string(),
        description: description.trim().to_string(),
    })
}

/// Parse every line, skipping the malformed ones.
pub fn parse_assessments<S: AsRef<str>>(lines: &[S]) -> Vec<IngredientAssessment> {
    lines
        .iter()
        .filter_map(|line| {
            let parsed = parse_assessment(line.as_ref());
            if parsed.is_none() {
                tracing::warn!("Skipping malformed assessment line: {}", line.as_ref());
            }
            parsed
        })
        .collect()
}
