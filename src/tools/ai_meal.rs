use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::assessment::IngredientAssessment;
use crate::conversation::{
    Assistant, ConversationState, InputMethod, Session, TranscriptMessage,
};
use crate::error::{InspectorError, Result};
use crate::media::ImageInput;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AiInputParams {
    /// "camera" | "upload"
    pub method: InputMethod,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct AiImageParams {
    /// Base64 image bytes, bare or as a data: URI
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Public http(s) URL of the image
    #[serde(default)]
    pub image_url: Option<String>,
    /// Path readable by the server; stdio transport only
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AiCluesParams {
    /// Foods or ingredients, comma separated
    pub text: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct AiCheckParams {}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct AiResetParams {}

/// Shared response shape for every meal-flow tool.
#[derive(Debug, Serialize)]
pub struct MealTurnResult {
    pub state: ConversationState,
    pub messages: Vec<TranscriptMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assessments: Vec<IngredientAssessment>,
    pub dangerous: bool,
}

impl MealTurnResult {
    pub fn from_session(session: &Session, messages: Vec<TranscriptMessage>) -> Self {
        let turn = session.turn();
        Self {
            state: session.state(),
            messages,
            ingredients: turn
                .map(|t| t.ingredients.iter().map(str::to_string).collect())
                .unwrap_or_default(),
            assessments: turn.map(|t| t.assessments.clone()).unwrap_or_default(),
            dangerous: turn.is_some_and(|t| t.has_danger()),
        }
    }
}

/// Exactly one image source must be given. Server-side paths are only
/// honored when `allow_paths` is set.
pub fn image_from_params(params: &AiImageParams, allow_paths: bool) -> Result<ImageInput> {
    let given = [
        params.image_base64.is_some(),
        params.image_url.is_some(),
        params.image_path.is_some(),
    ]
    .iter()
    .filter(|g| **g)
    .count();
    if given != 1 {
        return Err(InspectorError::Media(
            "provide exactly one of image_base64, image_url or image_path".to_string(),
        ));
    }

    if let Some(encoded) = &params.image_base64 {
        ImageInput::from_base64(encoded)
    } else if let Some(url) = &params.image_url {
        ImageInput::from_url(url)
    } else if let Some(path) = &params.image_path {
        if !allow_paths {
            return Err(InspectorError::Media(
                "image_path is not accepted over this transport; send image_base64 or image_url"
                    .to_string(),
            ));
        }
        ImageInput::from_path(Path::new(path))
    } else {
        Err(InspectorError::Internal("image source vanished".to_string()))
    }
}

pub fn ai_input_impl(
    assistant: &Assistant,
    session: &mut Session,
    params: AiInputParams,
) -> Result<MealTurnResult> {
    let messages = assistant.choose_input(session, params.method)?;
    Ok(MealTurnResult::from_session(session, messages))
}

pub async fn ai_image_impl(
    assistant: &Assistant,
    session: &mut Session,
    params: AiImageParams,
    allow_paths: bool,
) -> Result<MealTurnResult> {
    let image = image_from_params(&params, allow_paths)?;
    let messages = assistant.submit_image(session, image).await?;
    Ok(MealTurnResult::from_session(session, messages))
}

pub fn ai_clues_impl(
    assistant: &Assistant,
    session: &mut Session,
    params: AiCluesParams,
) -> Result<MealTurnResult> {
    let messages = assistant.submit_clues(session, &params.text)?;
    Ok(MealTurnResult::from_session(session, messages))
}

pub async fn ai_check_impl(
    assistant: &Assistant,
    session: &mut Session,
    _params: AiCheckParams,
) -> Result<MealTurnResult> {
    let messages = assistant.check_allergens(session).await?;
    Ok(MealTurnResult::from_session(session, messages))
}

pub fn ai_reset_impl(
    assistant: &Assistant,
    session: &mut Session,
    _params: AiResetParams,
) -> Result<MealTurnResult> {
    let messages = assistant.reset(session);
    Ok(MealTurnResult::from_session(session, messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatResponse;
    use crate::tools::fixtures;
    use crate::transport::MockTransport;
    use std::io::Write;

    #[test]
    fn test_image_source_must_be_unique() {
        let none = AiImageParams::default();
        assert!(image_from_params(&none, true).unwrap_err().is_user_error());

        let both = AiImageParams {
            image_url: Some("https://example.com/a.jpg".to_string()),
            image_path: Some("/tmp/a.jpg".to_string()),
            ..Default::default()
        };
        assert!(image_from_params(&both, true).is_err());
    }

    #[test]
    fn test_image_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap();
        let params = AiImageParams {
            image_path: Some(file.path().display().to_string()),
            ..Default::default()
        };
        let image = image_from_params(&params, true).unwrap();
        assert!(image.to_model_url().starts_with("data:image/jpeg;base64,"));

        let err = image_from_params(&params, false).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("image_path"));
    }

    #[tokio::test]
    async fn test_clues_then_check_reports_danger() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(1).returning(|_| {
            Ok(ChatResponse::with_text(
                "[dangerous, 🥜, peanut sauce, \"peanuts, a common nut allergen\"]",
            ))
        });
        let assistant = fixtures::assistant(mock);
        let mut session = Session::new();
        session.profile.select_allergies(["Nuts"]);

        let result = ai_clues_impl(
            &assistant,
            &mut session,
            AiCluesParams {
                text: "Satay, peanut sauce".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.state, ConversationState::IngredientsShown);
        assert_eq!(result.ingredients, vec!["satay", "peanut sauce"]);

        let result = ai_check_impl(&assistant, &mut session, AiCheckParams::default())
            .await
            .unwrap();
        assert!(result.dangerous);
        assert_eq!(result.assessments[0].description, "peanuts, a common nut allergen");

        let result = ai_reset_impl(&assistant, &mut session, AiResetParams::default()).unwrap();
        assert_eq!(result.state, ConversationState::AwaitingInputMethod);
        assert!(result.ingredients.is_empty());
    }

    #[tokio::test]
    async fn test_image_before_choosing_input_is_rejected() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(0);
        let assistant = fixtures::assistant(mock);
        let mut session = Session::new();

        let err = ai_image_impl(
            &assistant,
            &mut session,
            AiImageParams {
                image_url: Some("https://example.com/meal.png".to_string()),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(session.state(), ConversationState::AwaitingInputMethod);
    }
}
