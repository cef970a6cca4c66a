use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conversation::{Assistant, Session};
use crate::error::Result;
use crate::profile::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProfileAction {
    Update,
    Confirm,
    Edit,
    Show,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AiProfileParams {
    /// "update" | "confirm" | "edit" | "show"
    pub action: ProfileAction,
    /// Display name; blank shows as "Guest"
    #[serde(default)]
    pub name: Option<String>,
    /// Free text about what makes you sick; new text is analyzed for allergies
    #[serde(default)]
    pub description: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Replaces the selected allergies
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AiProfileResult {
    pub action: ProfileAction,
    pub card: String,
    pub avatar_url: String,
    pub profile: UserProfile,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inferred: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

pub async fn ai_profile_impl(
    assistant: &Assistant,
    session: &mut Session,
    params: AiProfileParams,
) -> Result<AiProfileResult> {
    let outcome = match params.action {
        ProfileAction::Update => {
            assistant
                .update_profile(
                    session,
                    params.name,
                    params.description,
                    params.avatar_url,
                    params.allergies,
                )
                .await?
        }
        ProfileAction::Confirm => assistant.confirm_profile(session),
        ProfileAction::Edit => {
            assistant.edit_profile(session);
            Default::default()
        }
        ProfileAction::Show => Default::default(),
    };

    Ok(AiProfileResult {
        action: params.action,
        card: session.profile.summary(),
        avatar_url: session.profile.avatar_url().to_string(),
        profile: session.profile.clone(),
        inferred: outcome.inferred,
        notes: outcome.notes,
    })
}
