use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AuthSession;
use crate::cache::QueryCache;
use crate::error::ClientError;
use crate::resources::{Notifier, Resource, ResourceClient, TracingNotifier};
use crate::transport::{HttpTransport, Transport};

// ─── Activities ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub title: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub duration: Option<u32>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Resource for Activity {
    const DOMAIN: &'static str = "activities";
    const LABEL: &'static str = "Activity";
    type Create = NewActivity;
    type Update = ActivityUpdate;

    fn id(&self) -> &str {
        &self.id
    }
}

// ─── Goals ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    pub progress: u8,
    pub achieved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub progress: Option<f64>,
    pub achieved: Option<bool>,
}

impl Resource for Goal {
    const DOMAIN: &'static str = "goals";
    const LABEL: &'static str = "Goal";
    type Create = NewGoal;
    type Update = GoalUpdate;

    fn id(&self) -> &str {
        &self.id
    }
}

// ─── Habits ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub frequency: Frequency,
    pub target_per_period: u32,
    #[serde(default)]
    pub completions: Vec<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHabit {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_per_period: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub target_per_period: Option<u32>,
}

impl Resource for Habit {
    const DOMAIN: &'static str = "habits";
    const LABEL: &'static str = "Habit";
    type Create = NewHabit;
    type Update = HabitUpdate;

    fn id(&self) -> &str {
        &self.id
    }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Entry point for UI code: one shared cache and notifier across every resource.
#[derive(Clone)]
pub struct LifeTrackerClient {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
}

impl LifeTrackerClient {
    pub fn new(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transport,
            cache: Arc::new(QueryCache::default()),
            notifier,
        }
    }

    /// HTTP client against `base_url` that logs notifications.
    pub fn connect(base_url: &str, session: Arc<AuthSession>) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(base_url, session)?;
        Ok(Self::new(Arc::new(transport), Arc::new(TracingNotifier)))
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    fn resource<R: Resource>(&self) -> ResourceClient<R> {
        ResourceClient::new(
            self.transport.clone(),
            self.cache.clone(),
            self.notifier.clone(),
        )
    }

    pub fn activities(&self) -> ResourceClient<Activity> {
        self.resource()
    }

    pub fn goals(&self) -> ResourceClient<Goal> {
        self.resource()
    }

    pub fn habits(&self) -> ResourceClient<Habit> {
        self.resource()
    }

    /// POST /api/habits/:id/check-in, for today unless `date` is given.
    pub async fn check_in(&self, habit_id: &str, date: Option<NaiveDate>) -> Result<Habit, ClientError> {
        let body = date.map(|d| json!({ "date": d }));
        self.habits().action(habit_id, "check-in", body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::tests::{FakeTransport, RecordingNotifier};
    use crate::resources::ListParams;
    use reqwest::Method;

    fn habit_json(streak: u32) -> serde_json::Value {
        json!({
            "id": "h1",
            "userId": "u1",
            "name": "Stretch",
            "frequency": "daily",
            "targetPerPeriod": 1,
            "completions": ["2024-05-01"],
            "currentStreak": streak,
            "longestStreak": streak,
            "createdAt": "2024-05-01T00:00:00Z",
            "updatedAt": "2024-05-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_resources_share_one_cache() {
        let transport = Arc::new(FakeTransport::default());
        let client = LifeTrackerClient::new(transport.clone(), Arc::new(RecordingNotifier::default()));

        transport.reply(Ok(json!({"items": [habit_json(1)], "total": 1, "page": 1, "pageSize": 20})));
        client.habits().list(&ListParams::default()).await.unwrap();
        client.habits().list(&ListParams::default()).await.unwrap();
        assert_eq!(transport.request_count(), 1);

        transport.reply(Ok(json!({"items": [], "total": 0, "page": 1, "pageSize": 20})));
        assert!(client.goals().list(&ListParams::default()).await.unwrap().items.is_empty());
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_check_in_posts_and_invalidates_habits() {
        let transport = Arc::new(FakeTransport::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let client = LifeTrackerClient::new(transport.clone(), notifier.clone());

        transport.reply(Ok(json!({"items": [habit_json(1)], "total": 1, "page": 1, "pageSize": 20})));
        client.habits().list(&ListParams::default()).await.unwrap();

        transport.reply(Ok(habit_json(2)));
        let habit = client.check_in("h1", None).await.unwrap();
        assert_eq!(habit.current_streak, 2);

        let (method, path, _) = transport.requests.lock().unwrap()[1].clone();
        assert_eq!(method, Method::POST);
        assert_eq!(path, "/api/habits/h1/check-in");

        let list_key = ResourceClient::<Habit>::list_key(&ListParams::default());
        assert!(client.cache().fresh(&list_key).await.is_none());
        assert_eq!(
            notifier.messages.lock().unwrap().last().unwrap(),
            "ok: Habit updated"
        );
    }

    #[test]
    fn test_new_activity_omits_unset_fields() {
        let body = serde_json::to_value(NewActivity {
            title: "Walk".to_string(),
            category: "outdoor".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({"title": "Walk", "category": "outdoor"}));
    }
}
