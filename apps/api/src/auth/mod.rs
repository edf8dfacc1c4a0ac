// Bearer-token authentication for every /api route.
// Verification sits behind `TokenVerifier`: Azure AD JWKS in production, a mock session in development.

pub mod jwks;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AuthConfig;
use crate::errors::AppError;
use crate::state::AppState;

/// The verified caller. `id` is the partition key of everything the caller owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AppError>;

    /// Short label reported by the health endpoint.
    fn mode(&self) -> &'static str;
}

/// Picks the verifier for this deployment.
pub fn create_verifier(config: &AuthConfig) -> Arc<dyn TokenVerifier> {
    match (&config.client_id, config.mock) {
        (Some(client_id), false) => {
            info!(authority = %config.authority, "Verifying bearer tokens against Azure AD JWKS");
            Arc::new(jwks::JwksVerifier::new(&config.authority, client_id))
        }
        _ => {
            info!("Using mock authentication");
            Arc::new(mock::MockVerifier::default())
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        state.verifier.verify(token).await
    }
}
