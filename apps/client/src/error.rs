use thiserror::Error;

/// Authentication failures surfaced by an `AuthProvider`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Silent acquisition is impossible; the user has to sign in again.
    #[error("Interaction required: {0}")]
    InteractionRequired(String),

    #[error("No signed-in account")]
    NotSignedIn,

    #[error("Sign-in was cancelled")]
    Cancelled,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Error type for every API call made by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-success response; `message` comes from the API's `{"error": {"message"}}` body.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Client errors (4xx) will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.status(), Some(status) if (400..500).contains(&status))
            && !matches!(self, ClientError::Decode(_) | ClientError::Auth(_))
    }
}
