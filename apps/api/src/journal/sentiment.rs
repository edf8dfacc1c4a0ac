//! Sentiment scoring for journal entries.
//!
//! Default: `LexiconSentiment` (local word lists, deterministic, no network).
//! When `TEXT_ANALYTICS_ENDPOINT`/`TEXT_ANALYTICS_KEY` are set, `TextAnalyticsSentiment`
//! calls the Azure Language REST API and falls back to the lexicon on any failure.
//!
//! `AppState` holds an `Arc<dyn SentimentAnalyzer>` chosen at startup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TextAnalyticsConfig;

/// Longest document the sentiment endpoint accepts, in characters.
const MAX_DOCUMENT_CHARS: usize = 5120;
const API_PATH: &str = "/text/analytics/v3.1/sentiment";

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Scores text in `[-1.0, 1.0]`: negative below zero, positive above.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn score(&self, text: &str) -> f64;

    /// Backend name, reported by `/health`.
    fn backend(&self) -> &'static str;
}

pub fn create_analyzer(config: Option<&TextAnalyticsConfig>) -> Arc<dyn SentimentAnalyzer> {
    match config {
        Some(config) => Arc::new(TextAnalyticsSentiment::new(config)),
        None => Arc::new(LexiconSentiment),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LexiconSentiment
// ────────────────────────────────────────────────────────────────────────────

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "better", "calm", "cheerful", "confident", "content", "delighted",
    "energized", "enjoy", "enjoyed", "excellent", "excited", "fantastic", "fun", "glad",
    "good", "grateful", "great", "happy", "hopeful", "joy", "love", "loved", "motivated",
    "nice", "peaceful", "productive", "proud", "relaxed", "rested", "strong", "success",
    "thankful", "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoyed", "anxious", "awful", "bad", "bored", "depressed", "disappointed",
    "exhausted", "fail", "failed", "frustrated", "hate", "hated", "hurt", "lonely", "lost",
    "miserable", "nervous", "overwhelmed", "pain", "sad", "sick", "stress", "stressed",
    "terrible", "tired", "unhappy", "upset", "weak", "worried", "worse", "worst",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "don't", "didn't", "isn't", "wasn't"];

/// Counts positive and negative words; a preceding negation flips a word's polarity.
///
/// score = (positive - negative) / (positive + negative), or 0 when nothing matched.
pub struct LexiconSentiment;

#[async_trait]
impl SentimentAnalyzer for LexiconSentiment {
    async fn score(&self, text: &str) -> f64 {
        lexicon_score(text)
    }

    fn backend(&self) -> &'static str {
        "lexicon"
    }
}

pub fn lexicon_score(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let words = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty());

    let (mut positive, mut negative) = (0u32, 0u32);
    let mut negated = false;
    for word in words {
        let polarity = if POSITIVE_WORDS.contains(&word) {
            1
        } else if NEGATIVE_WORDS.contains(&word) {
            -1
        } else {
            0
        };
        match (polarity, negated) {
            (1, false) | (-1, true) => positive += 1,
            (-1, false) | (1, true) => negative += 1,
            _ => {}
        }
        negated = NEGATIONS.contains(&word);
    }

    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / total as f64
}

// ────────────────────────────────────────────────────────────────────────────
// TextAnalyticsSentiment
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SentimentRequest<'a> {
    documents: [RequestDocument<'a>; 1],
}

#[derive(Serialize)]
struct RequestDocument<'a> {
    id: &'a str,
    language: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    documents: Vec<DocumentSentiment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSentiment {
    confidence_scores: ConfidenceScores,
}

#[derive(Debug, Deserialize)]
struct ConfidenceScores {
    positive: f64,
    negative: f64,
}

pub struct TextAnalyticsSentiment {
    http: Client,
    url: String,
    key: String,
}

impl TextAnalyticsSentiment {
    pub fn new(config: &TextAnalyticsConfig) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: format!("{}{API_PATH}", config.endpoint.trim_end_matches('/')),
            key: config.key.clone(),
        }
    }

    async fn remote_score(&self, text: &str) -> Result<f64, reqwest::Error> {
        let body = SentimentRequest {
            documents: [RequestDocument {
                id: "1",
                language: "en",
                text: truncate_chars(text, MAX_DOCUMENT_CHARS),
            }],
        };
        let response: SentimentResponse = self
            .http
            .post(&self.url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .documents
            .first()
            .map(|d| d.confidence_scores.positive - d.confidence_scores.negative)
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0))
    }
}

#[async_trait]
impl SentimentAnalyzer for TextAnalyticsSentiment {
    async fn score(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        match self.remote_score(text).await {
            Ok(score) => {
                debug!(score, "Scored sentiment via Text Analytics");
                score
            }
            Err(e) => {
                warn!("Text Analytics sentiment failed, using lexicon: {e}");
                lexicon_score(text)
            }
        }
    }

    fn backend(&self) -> &'static str {
        "text-analytics"
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
