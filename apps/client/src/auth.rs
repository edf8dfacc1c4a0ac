//! Sign-in session for the API client.
//!
//! `AuthSession` gives callers one surface (`is_authenticated`, `user`, `login`, `logout`,
//! `acquire_token`) over whichever `AuthProvider` the factory picked:
//! - `MockAuthProvider` for development, issuing `mock:<userId>` tokens the API's mock
//!   verifier accepts;
//! - `OidcAuthProvider` for Azure AD, renewing silently with the refresh token and
//!   handing over to a host-supplied `InteractiveLogin` when that is impossible.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// Tokens are renewed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

impl TokenSet {
    pub fn will_expire_soon(&self) -> bool {
        self.expires_at <= Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self) -> Result<Account, AuthError>;
    async fn logout(&self) -> Result<(), AuthError>;
    async fn account(&self) -> Option<Account>;

    /// Returns a token without user interaction, or `AuthError::InteractionRequired`.
    async fn acquire_token_silent(&self) -> Result<String, AuthError>;
    async fn acquire_token_interactive(&self) -> Result<String, AuthError>;

    fn kind(&self) -> &'static str;
}

/// The interactive half of an OIDC sign-in (popup, redirect or system browser), run by
/// the host application.
#[async_trait]
pub trait InteractiveLogin: Send + Sync {
    async fn sign_in(&self, scopes: &[String]) -> Result<TokenSet, AuthError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct AuthSession {
    provider: Arc<dyn AuthProvider>,
}

impl AuthSession {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.provider.account().await.is_some()
    }

    pub async fn user(&self) -> Option<Account> {
        self.provider.account().await
    }

    pub async fn login(&self) -> Result<Account, AuthError> {
        let account = self.provider.login().await?;
        info!(provider = self.provider.kind(), user = %account.id, "Signed in");
        Ok(account)
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.provider.logout().await?;
        info!(provider = self.provider.kind(), "Signed out");
        Ok(())
    }

    /// Silent acquisition first; interactive only when the provider says it is required.
    pub async fn acquire_token(&self) -> Result<String, AuthError> {
        match self.provider.acquire_token_silent().await {
            Ok(token) => Ok(token),
            Err(AuthError::InteractionRequired(reason)) => {
                info!("Silent token acquisition failed ({reason}), prompting for sign-in");
                self.provider.acquire_token_interactive().await
            }
            Err(e) => Err(e),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Factory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub authority: String,
    pub scopes: Vec<String>,
    pub mock: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            authority: "https://login.microsoftonline.com/common".to_string(),
            scopes: vec!["openid".to_string(), "profile".to_string(), "offline_access".to_string()],
            mock: true,
        }
    }
}

/// Azure AD when a client id and an interactive login are available, the mock otherwise.
pub fn create_auth_provider(
    config: &AuthConfig,
    interactive: Option<Arc<dyn InteractiveLogin>>,
) -> Arc<dyn AuthProvider> {
    match (&config.client_id, interactive, config.mock) {
        (Some(client_id), Some(interactive), false) => {
            Arc::new(OidcAuthProvider::new(config, client_id, interactive))
        }
        _ => Arc::new(MockAuthProvider::default()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MockAuthProvider
// ────────────────────────────────────────────────────────────────────────────

pub struct MockAuthProvider {
    identity: Account,
    signed_in: RwLock<bool>,
}

impl MockAuthProvider {
    pub fn for_user(id: &str, name: &str) -> Self {
        Self {
            identity: Account {
                id: id.to_string(),
                name: name.to_string(),
                email: None,
            },
            signed_in: RwLock::new(false),
        }
    }

    fn token(&self) -> String {
        format!("mock:{}", self.identity.id)
    }
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        let mut provider = Self::for_user("mock-user-id", "Development User");
        provider.identity.email = Some("dev@lifetracker.local".to_string());
        provider
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn login(&self) -> Result<Account, AuthError> {
        *self.signed_in.write().await = true;
        Ok(self.identity.clone())
    }

    async fn logout(&self) -> Result<(), AuthError> {
        *self.signed_in.write().await = false;
        Ok(())
    }

    async fn account(&self) -> Option<Account> {
        self.signed_in.read().await.then(|| self.identity.clone())
    }

    async fn acquire_token_silent(&self) -> Result<String, AuthError> {
        if *self.signed_in.read().await {
            Ok(self.token())
        } else {
            Err(AuthError::InteractionRequired("not signed in".to_string()))
        }
    }

    async fn acquire_token_interactive(&self) -> Result<String, AuthError> {
        self.login().await?;
        Ok(self.token())
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OidcAuthProvider
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdClaims {
    sub: String,
    oid: Option<String>,
    name: Option<String>,
    preferred_username: Option<String>,
    email: Option<String>,
}

pub struct OidcAuthProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    scopes: Vec<String>,
    tokens: RwLock<Option<TokenSet>>,
    interactive: Arc<dyn InteractiveLogin>,
}

impl OidcAuthProvider {
    pub fn new(config: &AuthConfig, client_id: &str, interactive: Arc<dyn InteractiveLogin>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(StdDuration::from_secs(30))
                .build()
                .unwrap_or_default(),
            token_url: format!(
                "{}/oauth2/v2.0/token",
                config.authority.trim_end_matches('/')
            ),
            client_id: client_id.to_string(),
            scopes: config.scopes.clone(),
            tokens: RwLock::new(None),
            interactive,
        }
    }

    async fn refresh(&self, refresh_token: &str, previous: &TokenSet) -> Result<TokenSet, AuthError> {
        debug!("Refreshing access token");
        let scope = self.scopes.join(" ");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) if matches!(err.error.as_str(), "invalid_grant" | "interaction_required") => {
                    AuthError::InteractionRequired(err.error_description.unwrap_or(err.error))
                }
                Ok(err) => AuthError::Provider(err.error_description.unwrap_or(err.error)),
                Err(_) => AuthError::Provider(format!("token endpoint returned {status}")),
            });
        }

        let response: TokenResponse = response.json().await?;
        Ok(TokenSet {
            access_token: response.access_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in.unwrap_or(3600)),
            refresh_token: response
                .refresh_token
                .or_else(|| previous.refresh_token.clone()),
            id_token: response.id_token.or_else(|| previous.id_token.clone()),
        })
    }
}

#[async_trait]
impl AuthProvider for OidcAuthProvider {
    async fn login(&self) -> Result<Account, AuthError> {
        let tokens = self.interactive.sign_in(&self.scopes).await?;
        let account = tokens
            .id_token
            .as_deref()
            .and_then(account_from_id_token)
            .ok_or_else(|| AuthError::Provider("sign-in returned no usable id token".to_string()))?;
        *self.tokens.write().await = Some(tokens);
        Ok(account)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        *self.tokens.write().await = None;
        Ok(())
    }

    async fn account(&self) -> Option<Account> {
        let tokens = self.tokens.read().await;
        tokens
            .as_ref()
            .and_then(|t| t.id_token.as_deref())
            .and_then(account_from_id_token)
    }

    async fn acquire_token_silent(&self) -> Result<String, AuthError> {
        let current = self
            .tokens
            .read()
            .await
            .clone()
            .ok_or_else(|| AuthError::InteractionRequired("no cached account".to_string()))?;
        if !current.will_expire_soon() {
            return Ok(current.access_token);
        }

        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::InteractionRequired("no refresh token".to_string()))?;
        let renewed = match self.refresh(&refresh_token, &current).await {
            Ok(renewed) => renewed,
            Err(e) => {
                warn!("Token refresh failed: {e}");
                return Err(e);
            }
        };
        let access_token = renewed.access_token.clone();
        *self.tokens.write().await = Some(renewed);
        Ok(access_token)
    }

    async fn acquire_token_interactive(&self) -> Result<String, AuthError> {
        let tokens = self.interactive.sign_in(&self.scopes).await?;
        let access_token = tokens.access_token.clone();
        *self.tokens.write().await = Some(tokens);
        Ok(access_token)
    }

    fn kind(&self) -> &'static str {
        "azure-ad"
    }
}

/// Reads the account out of an id token's claims. The signature is not checked here;
/// the API validates every access token it receives.
fn account_from_id_token(id_token: &str) -> Option<Account> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: IdClaims = serde_json::from_slice(&bytes).ok()?;

    let email = claims
        .email
        .or_else(|| claims.preferred_username.clone().filter(|u| u.contains('@')));
    Some(Account {
        id: claims.oid.unwrap_or(claims.sub),
        name: claims
            .name
            .or(claims.preferred_username)
            .unwrap_or_else(|| "User".to_string()),
        email,
    })
}
