use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::cosmos::{CosmosClient, Document, Repository};
use crate::errors::AppError;

/// Profile document, one per signed-in user. `id` equals `userId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl Document for UserProfile {
    const CONTAINER: &'static str = "users";
    const KIND: &'static str = "User";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

pub struct UserModel {
    repo: Repository<UserProfile>,
}

impl UserModel {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            repo: Repository::new(client),
        }
    }

    /// Creates the profile on first sight of a user, otherwise refreshes name, email and
    /// `lastLoginAt` from the verified identity.
    pub async fn upsert_from_identity(&self, identity: &AuthUser) -> Result<UserProfile, AppError> {
        let now = Utc::now();
        let profile = match self.repo.find(&identity.id, &identity.id).await {
            Ok(mut existing) => {
                existing.name = identity.name.clone();
                if identity.email.is_some() {
                    existing.email = identity.email.clone();
                }
                existing.last_login_at = now;
                existing
            }
            Err(AppError::NotFound(_)) => {
                info!(user_id = %identity.id, "Creating user profile");
                UserProfile {
                    id: identity.id.clone(),
                    user_id: identity.id.clone(),
                    name: identity.name.clone(),
                    email: identity.email.clone(),
                    created_at: now,
                    last_login_at: now,
                }
            }
            Err(e) => return Err(e),
        };
        self.repo.upsert(&profile).await
    }

    pub async fn get(&self, user_id: &str) -> Result<UserProfile, AppError> {
        self.repo.find(user_id, user_id).await
    }
}
