use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::assessment::{IngredientAssessment, SafetyStatus, parse_assessments};
use crate::crosscheck::CrossChecker;
use crate::error::{InspectorError, Result};
use crate::inference::AllergyInference;
use crate::ingredients::{DetectedIngredients, IngredientDetector};
use crate::media::ImageInput;
use crate::profile::UserProfile;
use crate::video::{VideoGenerator, VideoHandle, VideoOutcome};

/// Where the conversation is for the current meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    AwaitingInputMethod,
    AwaitingCameraImage,
    AwaitingUpload,
    IngredientsShown,
    AllergensShown,
    VideoRequested,
    VideoShown,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationState::AwaitingInputMethod => "awaiting an input method",
            ConversationState::AwaitingCameraImage => "awaiting a camera picture",
            ConversationState::AwaitingUpload => "awaiting an uploaded picture",
            ConversationState::IngredientsShown => "showing ingredients",
            ConversationState::AllergensShown => "showing allergens",
            ConversationState::VideoRequested => "generating a video",
            ConversationState::VideoShown => "showing the video",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    Camera,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
    Doctor,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptMessage {
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub warning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<IngredientAssessment>,
    pub at: DateTime<Utc>,
}

/// Intermediate results for one meal; discarded on reset.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: Uuid,
    pub source: String,
    pub ingredients: DetectedIngredients,
    pub assessments: Vec<IngredientAssessment>,
    pub video: Option<VideoHandle>,
}

impl Turn {
    fn new(source: String, ingredients: DetectedIngredients) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            ingredients,
            assessments: Vec::new(),
            video: None,
        }
    }

    pub fn has_danger(&self) -> bool {
        self.assessments
            .iter()
            .any(|a| a.status == SafetyStatus::Dangerous)
    }
}

/// Per-user conversation state. Mutated only by [`Assistant`] events.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub profile: UserProfile,
    state: ConversationState,
    turn: Option<Turn>,
    transcript: Vec<TranscriptMessage>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            profile: UserProfile::default(),
            state: ConversationState::AwaitingInputMethod,
            turn: None,
            transcript: Vec::new(),
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn turn(&self) -> Option<&Turn> {
        self.turn.as_ref()
    }

    pub fn transcript(&self) -> &[TranscriptMessage] {
        &self.transcript
    }

    fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptMessage {
            speaker,
            text: text.into(),
            warning: false,
            assessment: None,
            at: Utc::now(),
        });
    }

    fn warn(&mut self, text: impl Into<String>) {
        self.transcript.push(TranscriptMessage {
            speaker: Speaker::Bot,
            text: text.into(),
            warning: true,
            assessment: None,
            at: Utc::now(),
        });
    }

    fn push_card(&mut self, assessment: IngredientAssessment) {
        self.transcript.push(TranscriptMessage {
            speaker: Speaker::Bot,
            text: assessment.card(),
            warning: assessment.status == SafetyStatus::Dangerous,
            assessment: Some(assessment),
            at: Utc::now(),
        });
    }

    fn since(&self, mark: usize) -> Vec<TranscriptMessage> {
        self.transcript[mark..].to_vec()
    }

    fn require(
        &self,
        allowed: &[ConversationState],
        event: &'static str,
    ) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(InspectorError::InvalidTransition {
                from: self.state,
                event,
            })
        }
    }

    fn turn_mut(&mut self, event: &'static str) -> Result<&mut Turn> {
        let state = self.state;
        self.turn
            .as_mut()
            .ok_or(InspectorError::InvalidTransition { from: state, event })
    }
}

/// Result of a profile event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileOutcome {
    pub inferred: Vec<String>,
    pub notes: Vec<String>,
}

const AWAITING_INPUT: [ConversationState; 3] = [
    ConversationState::AwaitingInputMethod,
    ConversationState::AwaitingCameraImage,
    ConversationState::AwaitingUpload,
];

/// Drives a [`Session`] through the meal-inspection flow.
pub struct Assistant {
    detector: IngredientDetector,
    checker: CrossChecker,
    inference: Arc<dyn AllergyInference>,
    video: Arc<VideoGenerator>,
}

impl Assistant {
    pub fn new(
        detector: IngredientDetector,
        checker: CrossChecker,
        inference: Arc<dyn AllergyInference>,
        video: Arc<VideoGenerator>,
    ) -> Self {
        Self {
            detector,
            checker,
            inference,
            video,
        }
    }

    pub fn choose_input(
        &self,
        session: &mut Session,
        method: InputMethod,
    ) -> Result<Vec<TranscriptMessage>> {
        session.require(&AWAITING_INPUT, "choose an input method")?;
        let mark = session.transcript.len();

        match method {
            InputMethod::Camera => {
                session.state = ConversationState::AwaitingCameraImage;
                session.push(Speaker::Bot, "Enable your camera and take a picture of your meal.");
            }
            InputMethod::Upload => {
                session.state = ConversationState::AwaitingUpload;
                session.push(Speaker::Bot, "Upload an image of the food (jpg, jpeg or png).");
            }
        }
        Ok(session.since(mark))
    }

    pub async fn submit_image(
        &self,
        session: &mut Session,
        image: ImageInput,
    ) -> Result<Vec<TranscriptMessage>> {
        session.require(
            &[
                ConversationState::AwaitingCameraImage,
                ConversationState::AwaitingUpload,
            ],
            "submit a picture",
        )?;
        let mark = session.transcript.len();

        session.push(Speaker::User, format!("📸 {}", image.describe()));
        if session.state == ConversationState::AwaitingCameraImage {
            session.push(Speaker::Bot, "Analyzing the captured picture...");
        } else {
            session.push(Speaker::Bot, "A picture, cool! Analyzing the evidence...");
        }

        let ingredients = match self.detector.try_detect(&image).await {
            Ok(ingredients) => ingredients,
            Err(e) => {
                tracing::warn!("Ingredient detection failed: {}", e);
                session.warn(format!("The vision service is unavailable right now ({e})."));
                DetectedIngredients::default()
            }
        };
        if ingredients.is_empty() {
            session.warn(
                "I couldn't recognize any ingredients in this picture. \
                 Try another photo or type the ingredients you know.",
            );
        } else {
            session.push(
                Speaker::Bot,
                format!("🔎 Clues (Ingredients): {}", ingredients.joined()),
            );
        }

        session.turn = Some(Turn::new(image.describe(), ingredients));
        session.state = ConversationState::IngredientsShown;
        Ok(session.since(mark))
    }

    /// Typed foods or ingredients instead of a picture.
    pub fn submit_clues(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<TranscriptMessage>> {
        session.require(&AWAITING_INPUT, "submit ingredient clues")?;
        let mark = session.transcript.len();

        let ingredients = DetectedIngredients::from_text(text);
        session.push(
            Speaker::User,
            format!("🔎 Clues (Food or Ingredients): {}", ingredients.joined()),
        );
        if ingredients.is_empty() {
            session.warn("I didn't catch any food or ingredient names in that message.");
        }

        session.turn = Some(Turn::new("typed clues".to_string(), ingredients));
        session.state = ConversationState::IngredientsShown;
        Ok(session.since(mark))
    }

    pub async fn check_allergens(&self, session: &mut Session) -> Result<Vec<TranscriptMessage>> {
        session.require(&[ConversationState::IngredientsShown], "check allergens")?;
        let mark = session.transcript.len();

        let allergies = session.profile.allergies.clone();
        if allergies.is_empty() {
            session.warn(
                "You haven't selected any allergies yet, so there is nothing to compare. \
                 Update your profile first.",
            );
        } else {
            session.push(
                Speaker::User,
                format!("and I'm also allergic to: {}", allergies.joined()),
            );
            session.push(Speaker::Bot, "Cool, let's take that into account.");
        }

        let ingredients = session.turn_mut("check allergens")?.ingredients.clone();
        let (lines, failed) = match self.checker.try_cross_check(&ingredients, &allergies).await {
            Ok(lines) => (lines, false),
            Err(e) => {
                tracing::warn!("Cross-check failed: {}", e);
                session.warn(format!("The allergy check service is unavailable right now ({e})."));
                (Vec::new(), true)
            }
        };
        let assessments = parse_assessments(&lines);

        if assessments.is_empty() {
            if !failed && !allergies.is_empty() && !ingredients.is_empty() {
                session.warn(
                    "I couldn't get a clear answer about these ingredients. \
                     Please double-check the labels yourself.",
                );
            }
        } else {
            session.push(Speaker::Bot, "Here are some things to watch out for.");
            for assessment in assessments.iter().cloned() {
                session.push_card(assessment);
            }
            if assessments.iter().any(|a| a.status == SafetyStatus::Dangerous) {
                tracing::info!("Dangerous ingredient found for session {}", session.id);
            }
            session.push(
                Speaker::Doctor,
                "Learn more about your allergies. I can prepare a video about the symptoms; \
                 this may take a while.",
            );
        }

        session.turn_mut("check allergens")?.assessments = assessments;
        session.state = ConversationState::AllergensShown;
        Ok(session.since(mark))
    }

    /// Start generation on a background task; poll with [`poll_video`](Self::poll_video).
    pub fn request_video(&self, session: &mut Session) -> Result<Vec<TranscriptMessage>> {
        session.require(&[ConversationState::AllergensShown], "request a video")?;
        let mark = session.transcript.len();

        let allergies: Vec<String> = session
            .profile
            .allergies
            .iter()
            .map(str::to_string)
            .collect();
        let handle = VideoHandle::spawn(Arc::clone(&self.video), allergies);
        session.turn_mut("request a video")?.video = Some(handle);

        session.push(
            Speaker::Doctor,
            "We are preparing a video and info about the symptoms. This may take a while.",
        );
        session.state = ConversationState::VideoRequested;
        Ok(session.since(mark))
    }

    pub fn poll_video(&self, session: &mut Session) -> Result<Vec<TranscriptMessage>> {
        session.require(&[ConversationState::VideoRequested], "check on the video")?;
        let mark = session.transcript.len();

        let outcome: Option<VideoOutcome> = session
            .turn_mut("check on the video")?
            .video
            .as_ref()
            .and_then(|h| h.outcome().cloned());

        match outcome {
            Some(outcome @ VideoOutcome::Completed { .. }) => {
                session.push(Speaker::Doctor, outcome.message());
                session.state = ConversationState::VideoShown;
            }
            Some(outcome) => {
                session.warn(outcome.message());
                session.state = ConversationState::VideoShown;
            }
            None => session.push(Speaker::Doctor, "Still working on your video..."),
        }
        Ok(session.since(mark))
    }

    pub fn video_outcome(&self, session: &Session) -> Option<VideoOutcome> {
        session
            .turn()
            .and_then(|t| t.video.as_ref())
            .and_then(|h| h.outcome().cloned())
    }

    /// Back to input selection. The profile is kept.
    pub fn reset(&self, session: &mut Session) -> Vec<TranscriptMessage> {
        let mark = session.transcript.len();
        if let Some(turn) = session.turn.take() {
            tracing::info!("Discarding turn {} ({})", turn.id, turn.source);
        }
        session.state = ConversationState::AwaitingInputMethod;
        session.push(
            Speaker::Bot,
            "Let's look at another meal! Upload a picture or take one with your camera.",
        );
        session.since(mark)
    }

    /// Sidebar form submission. Only accepted while the profile is being
    /// edited. A description the model has not answered for yet triggers
    /// allergy inference.
    pub async fn update_profile(
        &self,
        session: &mut Session,
        name: Option<String>,
        description: Option<String>,
        avatar: Option<String>,
        allergies: Option<Vec<String>>,
    ) -> Result<ProfileOutcome> {
        if session.profile.setup_complete {
            return Err(InspectorError::ProfileLocked);
        }

        let mut outcome = ProfileOutcome::default();
        let profile = &mut session.profile;

        if let Some(name) = name {
            profile.name = name.trim().to_string();
        }
        if let Some(avatar) = avatar {
            profile.avatar = Some(avatar.trim().to_string()).filter(|a| !a.is_empty());
        }
        if let Some(selected) = allergies {
            profile.select_allergies(selected);
        }

        if let Some(description) = description {
            let description = description.trim().to_string();
            profile.description = Some(description.clone()).filter(|d| !d.is_empty());

            let analyzed = profile.analyzed_description.as_deref() == Some(description.as_str());
            if !analyzed && !description.is_empty() {
                match self.inference.infer(&description).await {
                    Ok(inferred) => {
                        profile.analyzed_description = Some(description);
                        if inferred.is_empty() {
                            outcome.notes.push("No allergies identified.".to_string());
                        } else {
                            profile.add_inferred(&inferred);
                            outcome.inferred = inferred;
                        }
                    }
                    // Left unanalyzed so the next submission asks again
                    Err(e) => {
                        tracing::warn!("Allergy inference failed: {}", e);
                        outcome
                            .notes
                            .push("Couldn't analyze your description right now.".to_string());
                    }
                }
            }
        }

        Ok(outcome)
    }

    pub fn confirm_profile(&self, session: &mut Session) -> ProfileOutcome {
        let mut outcome = ProfileOutcome::default();
        if session.profile.allergies.is_empty() {
            outcome
                .notes
                .push("Please select at least one allergy.".to_string());
        } else {
            session.profile.setup_complete = true;
            tracing::info!(
                "Profile confirmed for {} with {} allergies",
                session.profile.display_name(),
                session.profile.allergies.len()
            );
        }
        outcome
    }

    pub fn edit_profile(&self, session: &mut Session) {
        session.profile.setup_complete = false;
    }
}
