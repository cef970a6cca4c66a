use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::{Instant, sleep};
use tokio_retry::strategy::FixedInterval;

use crate::config::Config;
use crate::error::{InspectorError, Result};
use crate::models::{VideoGenerationRequest, VideoGenerationResponse, VideoStatusResponse};

pub const MAX_VIDEO_PROMPT_CHARS: usize = 512;

/// Hosted text-to-video endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn submit(&self, req: &VideoGenerationRequest) -> Result<VideoGenerationResponse>;
    async fn status(&self, generation_id: &str) -> Result<VideoStatusResponse>;
}

pub struct HttpVideoApi {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpVideoApi {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: format!("{}/generation", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    async fn read<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InspectorError::Api { status, body });
        }
        response.json().await.map_err(|e| {
            InspectorError::Transport(format!("Failed to parse video API response: {e}"))
        })
    }
}

#[async_trait]
impl VideoApi for HttpVideoApi {
    async fn submit(&self, req: &VideoGenerationRequest) -> Result<VideoGenerationResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn status(&self, generation_id: &str) -> Result<VideoStatusResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(&self.api_key)
            .query(&[("generation_id", generation_id)])
            .send()
            .await?;
        Self::read(response).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Queued,
    Generating,
    Processing,
    Completed,
    Error,
}

impl VideoStatus {
    /// Unrecognized or missing status words count as still processing.
    pub fn parse(word: Option<&str>) -> Self {
        match word.map(|w| w.trim().to_lowercase()).as_deref() {
            Some("queued") => VideoStatus::Queued,
            Some("generating") => VideoStatus::Generating,
            Some("completed") => VideoStatus::Completed,
            Some("error") | Some("failed") => VideoStatus::Error,
            _ => VideoStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Error)
    }
}

/// A submitted generation, tracked until it reaches a terminal status.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJob {
    pub id: String,
    pub status: VideoStatus,
    pub url: Option<String>,
}

impl VideoJob {
    pub fn new(id: String) -> Self {
        Self {
            id,
            status: VideoStatus::Queued,
            url: None,
        }
    }

    fn update(&mut self, resp: &VideoStatusResponse) {
        self.status = VideoStatus::parse(resp.status.as_deref());
        self.url = resp.url();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VideoOutcome {
    Completed { id: String, url: String },
    Failed { id: Option<String>, reason: String },
    TimedOut { id: String, waited_seconds: u64 },
}

impl VideoOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            VideoOutcome::Completed { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Text shown to the user.
    pub fn message(&self) -> String {
        match self {
            VideoOutcome::Completed { url, .. } => {
                format!("Your video about your allergies is ready: {url}")
            }
            VideoOutcome::Failed { reason, .. } => {
                format!("Sorry, the video could not be generated: {reason}")
            }
            VideoOutcome::TimedOut { id, waited_seconds } => format!(
                "The video is taking longer than expected (waited {waited_seconds}s). \
                 You can check on it later with generation ID {id}."
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: usize,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.video.max_attempts,
            timeout: config.poll_timeout(),
        }
    }
}

/// Submits a narrative prompt and polls until the video is ready.
pub struct VideoGenerator {
    api: Arc<dyn VideoApi>,
    model: String,
    ratio: String,
    duration: String,
    template: String,
    policy: PollPolicy,
}

impl VideoGenerator {
    pub fn new(api: Arc<dyn VideoApi>, config: &Config, template: String) -> Self {
        Self {
            api,
            model: config.video.model.clone(),
            ratio: config.video.ratio.clone(),
            duration: config.video.duration.clone(),
            template,
            policy: PollPolicy::from_config(config),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Narrative template plus the allergy list, capped at 512 characters.
    pub fn build_prompt(&self, allergies: &[String]) -> String {
        let full = format!(
            "{}\n\nAllergies considered: {}",
            self.template,
            allergies.join(", ")
        );
        full.chars().take(MAX_VIDEO_PROMPT_CHARS).collect()
    }

    pub async fn generate_video(&self, allergies: &[String]) -> VideoOutcome {
        let request = VideoGenerationRequest {
            model: self.model.clone(),
            prompt: self.build_prompt(allergies),
            ratio: self.ratio.clone(),
            duration: self.duration.clone(),
        };

        let submitted = match self.api.submit(&request).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Video submission failed: {}", e);
                return VideoOutcome::Failed {
                    id: None,
                    reason: e.to_string(),
                };
            }
        };

        let Some(id) = submitted.id.filter(|id| !id.trim().is_empty()) else {
            tracing::warn!("Video submission returned no generation id");
            return VideoOutcome::Failed {
                id: None,
                reason: "the video service did not return a generation id".to_string(),
            };
        };

        tracing::info!(generation_id = %id, "Video generation submitted");
        self.poll(VideoJob::new(id)).await
    }

    /// Fixed-interval polling. The first query is immediate; polling stops once
    /// elapsed time exceeds the timeout or the attempt budget runs out.
    async fn poll(&self, mut job: VideoJob) -> VideoOutcome {
        let started = Instant::now();
        let mut schedule =
            FixedInterval::new(self.policy.interval).take(self.policy.max_attempts.saturating_sub(1));

        loop {
            match self.api.status(&job.id).await {
                Ok(resp) => {
                    job.update(&resp);
                    tracing::debug!(generation_id = %job.id, status = ?job.status, "Video status");
                    match (&job.status, &job.url) {
                        (VideoStatus::Completed, Some(url)) => {
                            tracing::info!(generation_id = %job.id, "Video generation completed");
                            return VideoOutcome::Completed {
                                id: job.id.clone(),
                                url: url.clone(),
                            };
                        }
                        (VideoStatus::Completed, None) => {
                            return VideoOutcome::Failed {
                                id: Some(job.id.clone()),
                                reason: "the video finished but no URL was returned".to_string(),
                            };
                        }
                        (VideoStatus::Error, _) => {
                            let reason = resp
                                .error
                                .map(|e| match e {
                                    serde_json::Value::String(s) => s,
                                    other => other.to_string(),
                                })
                                .unwrap_or_else(|| "the video service reported an error".to_string());
                            tracing::warn!(generation_id = %job.id, "Video generation failed: {}", reason);
                            return VideoOutcome::Failed {
                                id: Some(job.id.clone()),
                                reason,
                            };
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(generation_id = %job.id, "Video status request failed: {}", e);
                    return VideoOutcome::Failed {
                        id: Some(job.id.clone()),
                        reason: e.to_string(),
                    };
                }
            }

            let waited = started.elapsed();
            let next = schedule.next();
            if waited > self.policy.timeout || next.is_none() {
                tracing::warn!(
                    generation_id = %job.id,
                    "Video generation timed out after {}s",
                    waited.as_secs()
                );
                return VideoOutcome::TimedOut {
                    id: job.id.clone(),
                    waited_seconds: waited.as_secs(),
                };
            }
            if let Some(delay) = next {
                sleep(delay).await;
            }
        }
    }
}

/// Write-once result slot filled by a background generation task.
#[derive(Debug, Clone, Default)]
pub struct VideoHandle {
    slot: Arc<OnceCell<VideoOutcome>>,
}

impl VideoHandle {
    /// Run the generation on its own task. It is never cancelled; it stops at
    /// its own poll ceiling.
    pub fn spawn(generator: Arc<VideoGenerator>, allergies: Vec<String>) -> Self {
        let handle = Self::default();
        let slot = Arc::clone(&handle.slot);
        tokio::spawn(async move {
            let outcome = generator.generate_video(&allergies).await;
            if slot.set(outcome).is_err() {
                tracing::warn!("Video result slot was already filled");
            }
        });
        handle
    }

    pub fn outcome(&self) -> Option<&VideoOutcome> {
        self.slot.get()
    }

    pub fn is_done(&self) -> bool {
        self.slot.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(word: &str, url: Option<&str>) -> VideoStatusResponse {
        VideoStatusResponse {
            status: Some(word.to_string()),
            video_url: url.map(str::to_string),
            ..Default::default()
        }
    }

    fn submitted(id: &str) -> VideoGenerationResponse {
        VideoGenerationResponse {
            id: Some(id.to_string()),
            status: Some("queued".to_string()),
        }
    }

    fn generator(api: MockVideoApi, policy: PollPolicy) -> VideoGenerator {
        VideoGenerator::new(Arc::new(api), &Config::default(), "Explain allergies.".to_string())
            .with_policy(policy)
    }

    fn policy(interval_secs: u64, max_attempts: usize, timeout_secs: u64) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(interval_secs),
            max_attempts,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_two_intervals() {
        let mut api = MockVideoApi::new();
        api.expect_submit().times(1).returning(|_| Ok(submitted("gen-1")));
        let mut calls = 0;
        api.expect_status()
            .withf(|id: &str| id == "gen-1")
            .times(3)
            .returning(move |_| {
                calls += 1;
                if calls < 3 {
                    Ok(status("processing", None))
                } else {
                    Ok(status("completed", Some("https://cdn.example.com/gen-1.mp4")))
                }
            });

        let start = Instant::now();
        let outcome = generator(api, policy(5, 10, 60))
            .generate_video(&["shrimp".to_string()])
            .await;

        assert_eq!(outcome.url(), Some("https://cdn.example.com/gen-1.mp4"));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_processing_times_out_with_id() {
        let mut api = MockVideoApi::new();
        api.expect_submit().returning(|_| Ok(submitted("gen-slow")));
        api.expect_status().returning(|_| Ok(status("processing", None)));

        let start = Instant::now();
        let outcome = generator(api, policy(5, 100, 12))
            .generate_video(&["milk".to_string()])
            .await;

        assert!(matches!(outcome, VideoOutcome::TimedOut { ref id, .. } if id == "gen-slow"));
        assert!(outcome.message().contains("gen-slow"));
        assert!(start.elapsed() > Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_at_exact_timeout_still_runs() {
        let mut api = MockVideoApi::new();
        api.expect_submit().returning(|_| Ok(submitted("gen-edge")));
        // Queries at 0s, 5s, 10s and 15s; only the last is past the 10s ceiling
        api.expect_status().times(4).returning(|_| Ok(status("processing", None)));

        let start = Instant::now();
        let outcome = generator(api, policy(5, 100, 10)).generate_video(&[]).await;

        assert!(matches!(outcome, VideoOutcome::TimedOut { waited_seconds: 15, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_bounds_polling() {
        let mut api = MockVideoApi::new();
        api.expect_submit().returning(|_| Ok(submitted("gen-2")));
        api.expect_status().times(3).returning(|_| Ok(status("queued", None)));

        let outcome = generator(api, policy(1, 3, 600)).generate_video(&[]).await;
        assert!(matches!(outcome, VideoOutcome::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_missing_generation_id_is_error() {
        let mut api = MockVideoApi::new();
        api.expect_submit()
            .returning(|_| Ok(VideoGenerationResponse::default()));
        api.expect_status().times(0);

        let outcome = generator(api, policy(1, 3, 10)).generate_video(&[]).await;
        assert!(matches!(outcome, VideoOutcome::Failed { id: None, .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_terminal() {
        let mut api = MockVideoApi::new();
        api.expect_submit().returning(|_| Ok(submitted("gen-3")));
        api.expect_status().times(1).returning(|_| {
            Ok(VideoStatusResponse {
                status: Some("error".to_string()),
                error: Some(serde_json::json!("content policy")),
                ..Default::default()
            })
        });

        let outcome = generator(api, policy(1, 3, 10)).generate_video(&[]).await;
        assert_eq!(
            outcome,
            VideoOutcome::Failed {
                id: Some("gen-3".to_string()),
                reason: "content policy".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_status_transport_error_is_terminal() {
        let mut api = MockVideoApi::new();
        api.expect_submit().returning(|_| Ok(submitted("gen-4")));
        api.expect_status()
            .times(1)
            .returning(|_| Err(InspectorError::Transport("dns failure".to_string())));

        let outcome = generator(api, policy(1, 3, 10)).generate_video(&[]).await;
        assert!(matches!(outcome, VideoOutcome::Failed { id: Some(_), .. }));
    }

    #[test]
    fn test_prompt_is_capped() {
        let api = MockVideoApi::new();
        let generator = VideoGenerator::new(Arc::new(api), &Config::default(), "x".repeat(600));
        let prompt = generator.build_prompt(&["nuts".to_string()]);
        assert_eq!(prompt.chars().count(), MAX_VIDEO_PROMPT_CHARS);

        let api = MockVideoApi::new();
        let generator = VideoGenerator::new(Arc::new(api), &Config::default(), "Intro".to_string());
        assert_eq!(
            generator.build_prompt(&["nuts".to_string(), "soy".to_string()]),
            "Intro\n\nAllergies considered: nuts, soy"
        );
    }

    #[tokio::test]
    async fn test_background_handle_fills_slot() {
        let mut api = MockVideoApi::new();
        api.expect_submit().returning(|_| Ok(submitted("gen-5")));
        api.expect_status()
            .returning(|_| Ok(status("completed", Some("https://cdn.example.com/5.mp4"))));

        let handle = VideoHandle::spawn(Arc::new(generator(api, policy(1, 3, 10))), vec![]);
        for _ in 0..100 {
            if handle.is_done() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(
            handle.outcome().and_then(VideoOutcome::url),
            Some("https://cdn.example.com/5.mp4")
        );
    }

    #[test]
    fn test_status_words() {
        assert_eq!(VideoStatus::parse(Some("COMPLETED")), VideoStatus::Completed);
        assert_eq!(VideoStatus::parse(Some("failed")), VideoStatus::Error);
        assert_eq!(VideoStatus::parse(None), VideoStatus::Processing);
        assert!(!VideoStatus::Generating.is_terminal());
    }
}
