use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::cosmos::{CosmosClient, Document, Repository, SqlQuery};
use crate::errors::AppError;
use crate::fitness::models::FitnessKind;
use crate::models::required_text;
use crate::pagination::{paginate, Page};

/// A fitness goal, stored in the `fitness` container with `type = "goal"`.
///
/// `progress == 100` exactly when `achieved` is true; the model keeps the two in step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: FitnessKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    pub progress: u8,
    pub achieved: bool,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Goal {
    const CONTAINER: &'static str = "fitness";
    const KIND: &'static str = "Goal";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn accepts(document: &Value) -> bool {
        document.get("type").and_then(Value::as_str) == Some(FitnessKind::Goal.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub achieved: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub progress: Option<f64>,
    pub achieved: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalFilter {
    pub achieved: Option<bool>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Brings `progress` and `achieved` into agreement.
///
/// Progress is authoritative and clamped to 0..=100. Setting only `achieved` moves progress:
/// `true` completes it, `false` on a completed goal reopens it at 0.
pub fn reconcile_progress(
    progress: f64,
    achieved: bool,
    progress_set: bool,
    achieved_set: bool,
) -> (u8, bool) {
    let mut progress = if progress.is_finite() {
        progress.round().clamp(0.0, 100.0) as u8
    } else {
        0
    };
    if achieved_set && !progress_set {
        if achieved {
            progress = 100;
        } else if progress == 100 {
            progress = 0;
        }
    }
    (progress, progress == 100)
}

/// Orders dated items before undated ones, earliest first.
pub fn dated_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub struct GoalModel {
    repo: Repository<Goal>,
}

impl GoalModel {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            repo: Repository::new(client),
        }
    }

    pub async fn create(&self, user_id: &str, input: NewGoal) -> Result<Goal, AppError> {
        let title = required_text(&input.title, "title")?;
        let (progress, achieved) = reconcile_progress(
            input.progress.unwrap_or(0.0),
            input.achieved.unwrap_or(false),
            input.progress.is_some(),
            input.achieved.is_some(),
        );

        let now = Utc::now();
        let goal = Goal {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: FitnessKind::Goal,
            title,
            description: input.description,
            category: input.category,
            target_date: input.target_date,
            progress,
            achieved,
            date: now,
            created_at: now,
            updated_at: now,
        };
        let goal = self.repo.insert(&goal).await?;
        info!(user_id, id = %goal.id, "Created goal");
        Ok(goal)
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<Goal, AppError> {
        self.repo.find(user_id, id).await
    }

    /// Goals ordered by target date (undated last), then creation time.
    pub async fn list(&self, user_id: &str, filter: &GoalFilter) -> Result<Page<Goal>, AppError> {
        let mut text = String::from("SELECT * FROM c WHERE c.userId = @userId AND c.type = @type");
        if filter.achieved.is_some() {
            text.push_str(" AND c.achieved = @achieved");
        }
        let mut query = SqlQuery::new(text)
            .param("@userId", user_id)
            .param("@type", FitnessKind::Goal.as_str());
        if let Some(achieved) = filter.achieved {
            query = query.param("@achieved", achieved);
        }

        let mut goals: Vec<Goal> = self
            .repo
            .query(user_id, query)
            .await?
            .into_iter()
            .filter(|g| {
                filter
                    .category
                    .as_deref()
                    .map_or(true, |c| g.category.as_deref() == Some(c))
            })
            .collect();
        goals.sort_by(|a, b| {
            dated_first(a.target_date, b.target_date).then(a.created_at.cmp(&b.created_at))
        });
        Ok(paginate(goals, filter.page, filter.page_size))
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        update: GoalUpdate,
    ) -> Result<Goal, AppError> {
        let mut goal = self.repo.find(user_id, id).await?;

        if let Some(title) = update.title {
            goal.title = required_text(&title, "title")?;
        }
        if let Some(description) = update.description {
            goal.description = Some(description);
        }
        if let Some(category) = update.category {
            goal.category = Some(category);
        }
        if let Some(target_date) = update.target_date {
            goal.target_date = Some(target_date);
        }
        let (progress, achieved) = reconcile_progress(
            update.progress.unwrap_or(goal.progress as f64),
            update.achieved.unwrap_or(goal.achieved),
            update.progress.is_some(),
            update.achieved.is_some(),
        );
        if achieved && !goal.achieved {
            info!(user_id, id, "Goal achieved");
        }
        goal.progress = progress;
        goal.achieved = achieved;
        goal.updated_at = Utc::now();

        self.repo.replace(&goal).await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.repo.remove(user_id, id).await
    }

    pub async fn all(&self, user_id: &str) -> Result<Vec<Goal>, AppError> {
        let query = SqlQuery::new("SELECT * FROM c WHERE c.userId = @userId AND c.type = @type")
            .param("@userId", user_id)
            .param("@type", FitnessKind::Goal.as_str());
        self.repo.query(user_id, query).await
    }
}
