//! Fitness summary generation.
//!
//! `MockSummarizer` builds deterministic text from the stats (development, tests, or no
//! API key). `OpenAiSummarizer` sends the same stats through the LLM client.
//! `AppState` holds an `Arc<dyn FitnessSummarizer>` chosen at startup.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::prompts::{fitness_summary_prompt, FITNESS_SUMMARY_SYSTEM};
use super::stats::FitnessStats;
use crate::config::OpenAiConfig;
use crate::errors::AppError;
use crate::llm_client::LlmClient;

#[async_trait]
pub trait FitnessSummarizer: Send + Sync {
    async fn summarize(&self, stats: &FitnessStats, days: u32) -> Result<String, AppError>;

    /// Reported in the summary response and by `/health`.
    fn provider(&self) -> &'static str;
}

pub fn create_summarizer(config: &OpenAiConfig) -> Arc<dyn FitnessSummarizer> {
    if config.mock {
        return Arc::new(MockSummarizer);
    }
    match LlmClient::new(config) {
        Ok(llm) => {
            info!("Fitness summaries via {} ({})", config.base_url, llm.model());
            Arc::new(OpenAiSummarizer(llm))
        }
        Err(e) => {
            warn!("OpenAI client unavailable, using mock summaries: {e}");
            Arc::new(MockSummarizer)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MockSummarizer
// ────────────────────────────────────────────────────────────────────────────

pub struct MockSummarizer;

#[async_trait]
impl FitnessSummarizer for MockSummarizer {
    async fn summarize(&self, stats: &FitnessStats, days: u32) -> Result<String, AppError> {
        Ok(mock_summary(stats, days))
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

fn mock_summary(stats: &FitnessStats, days: u32) -> String {
    if stats.workouts == 0 && stats.measurements == 0 {
        return format!(
            "No workouts or measurements were logged in the last {days} days. \
             Log a session to start building momentum."
        );
    }

    let mut summary = format!(
        "In the last {days} days you completed {} workout{} totalling {} minutes",
        stats.workouts,
        if stats.workouts == 1 { "" } else { "s" },
        stats.total_minutes
    );
    if stats.total_calories > 0 {
        summary.push_str(&format!(" and burned about {} calories", stats.total_calories));
    }
    summary.push('.');

    let favourite = stats
        .workout_types
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(kind, _)| kind);
    if let Some(kind) = favourite {
        summary.push_str(&format!(" Your most frequent workout was {kind}."));
    }
    match (stats.latest_weight, stats.weight_change) {
        (Some(weight), Some(change)) => {
            summary.push_str(&format!(" Latest weight {weight} kg ({change:+} kg over the period)."))
        }
        (Some(weight), None) => summary.push_str(&format!(" Latest weight {weight} kg.")),
        _ => {}
    }
    summary
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAiSummarizer
// ────────────────────────────────────────────────────────────────────────────

pub struct OpenAiSummarizer(pub LlmClient);

#[async_trait]
impl FitnessSummarizer for OpenAiSummarizer {
    async fn summarize(&self, stats: &FitnessStats, days: u32) -> Result<String, AppError> {
        let prompt = fitness_summary_prompt(stats, days);
        self.0
            .complete(FITNESS_SUMMARY_SYSTEM, &prompt)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_config(api_key: Option<&str>, mock: bool) -> OpenAiConfig {
        OpenAiConfig {
            api_key: api_key.map(str::to_string),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            mock,
        }
    }

    #[tokio::test]
    async fn test_mock_summary_mentions_stats() {
        let mut stats = FitnessStats {
            workouts: 3,
            total_minutes: 95,
            total_calories: 640,
            measurements: 1,
            latest_weight: Some(70.2),
            ..Default::default()
        };
        stats.workout_types.insert("running".to_string(), 2);
        stats.workout_types.insert("yoga".to_string(), 1);

        let text = MockSummarizer.summarize(&stats, 30).await.unwrap();
        assert!(text.contains("3 workouts totalling 95 minutes"));
        assert!(text.contains("640 calories"));
        assert!(text.contains("most frequent workout was running"));
        assert!(text.contains("70.2 kg"));
    }

    #[tokio::test]
    async fn test_mock_summary_for_empty_window() {
        let text = MockSummarizer
            .summarize(&FitnessStats::default(), 7)
            .await
            .unwrap();
        assert!(text.starts_with("No workouts"));
    }

    #[test]
    fn test_factory() {
        assert_eq!(create_summarizer(&openai_config(Some("k"), true)).provider(), "mock");
        assert_eq!(create_summarizer(&openai_config(None, false)).provider(), "mock");
        assert_eq!(create_summarizer(&openai_config(Some("k"), false)).provider(), "openai");
    }
}
