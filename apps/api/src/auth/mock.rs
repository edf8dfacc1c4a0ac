use async_trait::async_trait;

use super::{AuthUser, TokenVerifier};
use crate::errors::AppError;

const MOCK_PREFIX: &str = "mock:";

/// Development session: every token is accepted.
/// `mock:<userId>` signs in as that user, anything else as the fixed development user.
pub struct MockVerifier {
    default_user: AuthUser,
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self {
            default_user: AuthUser {
                id: "mock-user-id".to_string(),
                name: "Development User".to_string(),
                email: Some("dev@lifetracker.local".to_string()),
            },
        }
    }
}

#[async_trait]
impl TokenVerifier for MockVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AppError> {
        match token.strip_prefix(MOCK_PREFIX).map(str::trim) {
            Some("") => Err(AppError::Unauthorized("empty mock user id".to_string())),
            Some(user_id) => Ok(AuthUser {
                id: user_id.to_string(),
                name: format!("Mock User {user_id}"),
                email: None,
            }),
            None => Ok(self.default_user.clone()),
        }
    }

    fn mode(&self) -> &'static str {
        "mock"
    }
}
