//! Azure AD access token validation.
//!
//! Signing keys are fetched from `{authority}/discovery/v2.0/keys` and cached for an hour;
//! an unknown `kid` forces a refresh so key rotation is picked up without a restart. Forced
//! refreshes are at least `MIN_REFRESH_INTERVAL_SECS` apart, so tokens with made-up key ids
//! cannot turn into one upstream request each.
//! Tokens must be RS256, unexpired, and addressed to the configured client id. The issuer
//! is checked only when the authority names a concrete tenant.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AuthUser, TokenVerifier};
use crate::errors::AppError;

const KEY_CACHE_TTL_SECS: i64 = 3600;
const MIN_REFRESH_INTERVAL_SECS: i64 = 30;
const MULTI_TENANT_AUTHORITIES: [&str; 3] = ["common", "organizations", "consumers"];

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    #[serde(default)]
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

struct CachedKeys {
    keys: HashMap<String, Jwk>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AzureClaims {
    sub: String,
    oid: Option<String>,
    name: Option<String>,
    preferred_username: Option<String>,
    email: Option<String>,
}

pub struct JwksVerifier {
    http: Client,
    jwks_url: String,
    issuer: Option<String>,
    audiences: Vec<String>,
    cached_keys: Arc<RwLock<Option<CachedKeys>>>,
    last_refresh: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl JwksVerifier {
    pub fn new(authority: &str, client_id: &str) -> Self {
        let authority = authority.trim_end_matches('/');
        Self {
            http: Client::builder()
                .timeout(StdDuration::from_secs(10))
                .build()
                .unwrap_or_default(),
            jwks_url: format!("{authority}/discovery/v2.0/keys"),
            issuer: tenant_issuer(authority),
            audiences: vec![client_id.to_string(), format!("api://{client_id}")],
            cached_keys: Arc::new(RwLock::new(None)),
            last_refresh: Arc::new(RwLock::new(None)),
        }
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AppError> {
        let jwk = match self.cached_key(kid).await {
            Some(jwk) => jwk,
            None => {
                if !self.claim_refresh().await {
                    debug!(kid, "Signing key refresh throttled");
                    return Err(AppError::Unauthorized(format!(
                        "no signing key with kid {kid}"
                    )));
                }
                self.refresh_keys().await?;
                self.cached_key(kid).await.ok_or_else(|| {
                    AppError::Unauthorized(format!("no signing key with kid {kid}"))
                })?
            }
        };

        match (jwk.kty.as_str(), jwk.n.as_deref(), jwk.e.as_deref()) {
            ("RSA", Some(n), Some(e)) => DecodingKey::from_rsa_components(n, e)
                .map_err(|e| AppError::Unauthorized(format!("unusable signing key: {e}"))),
            _ => Err(AppError::Unauthorized(format!(
                "signing key {kid} is not an RSA key"
            ))),
        }
    }

    async fn cached_key(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cached_keys.read().await;
        cache.as_ref().and_then(|cached| {
            (cached.expires_at > Utc::now())
                .then(|| cached.keys.get(kid).cloned())
                .flatten()
        })
    }

    /// Records a refresh attempt unless one happened within the minimum interval.
    async fn claim_refresh(&self) -> bool {
        let mut last = self.last_refresh.write().await;
        let now = Utc::now();
        if last.is_some_and(|at| now - at < Duration::seconds(MIN_REFRESH_INTERVAL_SECS)) {
            return false;
        }
        *last = Some(now);
        true
    }

    async fn refresh_keys(&self) -> Result<(), AppError> {
        debug!(url = %self.jwks_url, "Fetching signing keys");
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("Failed to fetch JWKS: {e}");
                AppError::Unauthorized("signing keys unavailable".to_string())
            })?;
        let set: JwkSet = response.json().await.map_err(|e| {
            warn!("Failed to parse JWKS: {e}");
            AppError::Unauthorized("signing keys unavailable".to_string())
        })?;

        let keys: HashMap<String, Jwk> = set
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();
        info!(count = keys.len(), "Refreshed signing keys");

        *self.cached_keys.write().await = Some(CachedKeys {
            keys,
            expires_at: Utc::now() + Duration::seconds(KEY_CACHE_TTL_SECS),
        });
        Ok(())
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(self.audiences.as_slice());
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AppError> {
        let header = decode_header(token)
            .map_err(|e| AppError::Unauthorized(format!("malformed token: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("token missing key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;
        let data = decode::<AzureClaims>(token, &key, &self.validation()).map_err(|e| {
            AppError::Unauthorized(match e.kind() {
                ErrorKind::ExpiredSignature => "token expired".to_string(),
                ErrorKind::InvalidAudience => "invalid token audience".to_string(),
                ErrorKind::InvalidIssuer => "invalid token issuer".to_string(),
                _ => format!("invalid token: {e}"),
            })
        })?;

        Ok(identity_from_claims(data.claims))
    }

    fn mode(&self) -> &'static str {
        "azure-ad"
    }
}

fn identity_from_claims(claims: AzureClaims) -> AuthUser {
    let email = claims.email.or_else(|| {
        claims
            .preferred_username
            .clone()
            .filter(|u| u.contains('@'))
    });
    let name = claims
        .name
        .or(claims.preferred_username)
        .unwrap_or_else(|| "User".to_string());
    AuthUser {
        id: claims.oid.unwrap_or(claims.sub),
        name,
        email,
    }
}

/// v2.0 issuer for single-tenant authorities; `None` for the multi-tenant endpoints.
fn tenant_issuer(authority: &str) -> Option<String> {
    let tenant = authority.rsplit('/').next()?;
    if tenant.is_empty() || MULTI_TENANT_AUTHORITIES.contains(&tenant) {
        return None;
    }
    Some(format!("{authority}/v2.0"))
}
