use std::sync::Arc;

use crate::error::Result;
use crate::ingredients::DetectedIngredients;
use crate::models::{ChatMessage, ChatRequest};
use crate::profile::AllergySet;
use crate::prompts::fill;
use crate::transport::Transport;

/// Text-model client that classifies each ingredient against the allergies.
pub struct CrossChecker {
    tx: Arc<dyn Transport>,
    model: String,
    template: String,
}

impl CrossChecker {
    pub fn new(tx: Arc<dyn Transport>, model: String, template: String) -> Self {
        Self {
            tx,
            model,
            template,
        }
    }

    /// Bracketed reply lines, in model order. Both inputs must be non-empty;
    /// otherwise the model is not called and the result is empty.
    pub async fn try_cross_check(
        &self,
        ingredients: &DetectedIngredients,
        allergies: &AllergySet,
    ) -> Result<Vec<String>> {
        if ingredients.is_empty() || allergies.is_empty() {
            tracing::info!(
                ingredients = ingredients.len(),
                allergies = allergies.len(),
                "Skipping cross-check: nothing to compare"
            );
            return Ok(Vec::new());
        }

        tracing::info!(
            "Cross-checking {} ingredients against {} allergies",
            ingredients.len(),
            allergies.len()
        );

        let ingredient_list = ingredients.joined();
        let allergy_list = allergies.joined();
        let prompt = fill(
            &self.template,
            &[
                ("ingredients", ingredient_list.as_str()),
                ("allergies", allergy_list.as_str()),
            ],
        );
        let request = ChatRequest::single(&self.model, ChatMessage::user_text(prompt));
        let response = self.tx.chat(&request).await?;

        Ok(bracketed_lines(&response.first_text()))
    }

    /// Like [`try_cross_check`](Self::try_cross_check) but failures yield an empty list.
    pub async fn cross_check(
        &self,
        ingredients: &DetectedIngredients,
        allergies: &AllergySet,
    ) -> Vec<String> {
        match self.try_cross_check(ingredients, allergies).await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("Cross-check failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn bracketed_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('['))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InspectorError;
    use crate::models::ChatResponse;
    use crate::transport::MockTransport;

    fn checker(mock: MockTransport) -> CrossChecker {
        CrossChecker::new(
            Arc::new(mock),
            "text-model".to_string(),
            "Ingredients: {ingredients}\nAllergies: {allergies}".to_string(),
        )
    }

    #[tokio::test]
    async fn test_empty_ingredients_never_call_model() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(0);
        let allergies: AllergySet = ["Seafood"].into_iter().collect();

        let lines = checker(mock)
            .cross_check(&DetectedIngredients::default(), &allergies)
            .await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_empty_allergies_never_call_model() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(0);
        let ingredients = DetectedIngredients::from_text("rice, shrimp");

        let lines = checker(mock)
            .cross_check(&ingredients, &AllergySet::new())
            .await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_filters_to_bracketed_lines_in_order() {
        let mut mock = MockTransport::new();
        mock.expect_chat()
            .withf(|req: &ChatRequest| {
                let text = req.messages[0].content.text();
                text == "Ingredients: rice, shrimp\nAllergies: Seafood, Soy"
            })
            .times(1)
            .returning(|_| {
                Ok(ChatResponse::with_text(
                    "Here is the analysis:\n\
                     [safe, 🍚, rice, \"no known relation\"]\n\
                     \n  [dangerous, 🍤, shrimp, \"shellfish allergy\"]\n\
                     Stay safe!",
                ))
            });

        let ingredients = DetectedIngredients::from_text("rice, shrimp");
        let allergies: AllergySet = ["Seafood", "Soy"].into_iter().collect();
        let lines = checker(mock).cross_check(&ingredients, &allergies).await;
        assert_eq!(
            lines,
            vec![
                "[safe, 🍚, rice, \"no known relation\"]",
                "[dangerous, 🍤, shrimp, \"shellfish allergy\"]",
            ]
        );
    }

    #[tokio::test]
    async fn test_api_error_yields_empty() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(1).returning(|_| {
            Err(InspectorError::Api {
                status: 503,
                body: "overloaded".to_string(),
            })
        });
        let ingredients = DetectedIngredients::from_text("rice");
        let allergies: AllergySet = ["Soy"].into_iter().collect();
        assert!(checker(mock).cross_check(&ingredients, &allergies).await.is_empty());
    }
}
