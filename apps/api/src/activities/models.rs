use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cosmos::{CosmosClient, Document, Repository, SqlQuery};
use crate::errors::AppError;
use crate::models::required_text;
use crate::pagination::{paginate, Page};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub category: String,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Activity {
    const CONTAINER: &'static str = "activities";
    const KIND: &'static str = "Activity";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub duration: Option<u32>,
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub duration: Option<u32>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct ActivityModel {
    repo: Repository<Activity>,
}

impl ActivityModel {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            repo: Repository::new(client),
        }
    }

    pub async fn create(&self, user_id: &str, input: NewActivity) -> Result<Activity, AppError> {
        let title = required_text(&input.title, "title")?;
        let category = required_text(&input.category, "category")?.to_lowercase();
        let now = Utc::now();

        let activity = Activity {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title,
            category,
            duration: input.duration,
            date: input.date.unwrap_or_else(|| now.date_naive()),
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        let activity = self.repo.insert(&activity).await?;
        info!(user_id, id = %activity.id, category = %activity.category, "Logged activity");
        Ok(activity)
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<Activity, AppError> {
        self.repo.find(user_id, id).await
    }

    /// Most recent first.
    pub async fn list(
        &self,
        user_id: &str,
        filter: &ActivityFilter,
    ) -> Result<Page<Activity>, AppError> {
        let activities = self.in_range(user_id, filter.category.as_deref(), filter.from, filter.to).await?;
        Ok(paginate(activities, filter.page, filter.page_size))
    }

    /// Unpaginated activities between two dates (inclusive), most recent first.
    pub async fn in_range(
        &self,
        user_id: &str,
        category: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Activity>, AppError> {
        let category = category.map(str::to_lowercase);
        let mut text = String::from("SELECT * FROM c WHERE c.userId = @userId");
        if category.is_some() {
            text.push_str(" AND c.category = @category");
        }
        let mut query = SqlQuery::new(text).param("@userId", user_id);
        if let Some(category) = &category {
            query = query.param("@category", category.as_str());
        }

        let mut activities: Vec<Activity> = self
            .repo
            .query(user_id, query)
            .await?
            .into_iter()
            .filter(|a| from.map_or(true, |f| a.date >= f) && to.map_or(true, |t| a.date <= t))
            .collect();
        activities.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(activities)
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        update: ActivityUpdate,
    ) -> Result<Activity, AppError> {
        let mut activity = self.repo.find(user_id, id).await?;

        if let Some(title) = update.title {
            activity.title = required_text(&title, "title")?;
        }
        if let Some(category) = update.category {
            activity.category = required_text(&category, "category")?.to_lowercase();
        }
        if let Some(duration) = update.duration {
            activity.duration = Some(duration);
        }
        if let Some(date) = update.date {
            activity.date = date;
        }
        if let Some(notes) = update.notes {
            activity.notes = Some(notes);
        }
        activity.updated_at = Utc::now();

        self.repo.replace(&activity).await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.repo.remove(user_id, id).await
    }
}
