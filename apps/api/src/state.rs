use std::sync::Arc;

use crate::analytics::summary::FitnessSummarizer;
use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::cosmos::CosmosClient;
use crate::journal::sentiment::SentimentAnalyzer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Cosmos DB, or the in-memory mock it falls back to.
    pub cosmos: Arc<CosmosClient>,
    /// Azure AD JWKS validation, or the mock session in development.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Lexicon by default. Azure Text Analytics when TEXT_ANALYTICS_* is set.
    pub sentiment: Arc<dyn SentimentAnalyzer>,
    /// Mock text unless an OpenAI key is configured.
    pub summarizer: Arc<dyn FitnessSummarizer>,
}

#[cfg(test)]
pub fn test_state() -> AppState {
    use crate::analytics::summary::MockSummarizer;
    use crate::auth::mock::MockVerifier;
    use crate::journal::sentiment::LexiconSentiment;

    AppState {
        config: Config::from_lookup(|_| None).unwrap(),
        cosmos: Arc::new(CosmosClient::mock()),
        verifier: Arc::new(MockVerifier::default()),
        sentiment: Arc::new(LexiconSentiment),
        summarizer: Arc::new(MockSummarizer),
    }
}
