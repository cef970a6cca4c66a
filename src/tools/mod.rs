pub mod ai_meal;
pub mod ai_profile;
pub mod ai_video;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::conversation::Assistant;
    use crate::crosscheck::CrossChecker;
    use crate::inference::ModelAllergyInference;
    use crate::ingredients::IngredientDetector;
    use crate::transport::{MockTransport, Transport};
    use crate::video::{MockVideoApi, VideoGenerator};

    /// Assistant whose collaborators all share one transport mock.
    pub fn assistant(tx: MockTransport) -> Assistant {
        let tx: Arc<dyn Transport> = Arc::new(tx);
        let video = VideoGenerator::new(
            Arc::new(MockVideoApi::new()),
            &Config::default(),
            "Explain.".to_string(),
        );
        Assistant::new(
            IngredientDetector::new(tx.clone(), "vision".to_string(), "List.".to_string()),
            CrossChecker::new(tx.clone(), "text".to_string(), "{ingredients}|{allergies}".to_string()),
            Arc::new(ModelAllergyInference::new(
                tx,
                "text".to_string(),
                "{description}".to_string(),
            )),
            Arc::new(video),
        )
    }
}
