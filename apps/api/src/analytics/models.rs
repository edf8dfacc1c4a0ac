use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::stats::{
    compute_activity_stats, compute_fitness_stats, compute_goal_stats, compute_habit_stats,
    compute_journal_stats, compute_task_stats, ActivityStats, FitnessStats, GoalStats,
    HabitStats, JournalStats, TaskStats, Window,
};
use crate::activities::models::ActivityModel;
use crate::cosmos::{CosmosClient, Document, Repository};
use crate::errors::AppError;
use crate::fitness::models::{FitnessFilter, FitnessModel};
use crate::goals::models::GoalModel;
use crate::habits::models::HabitModel;
use crate::journal::models::{EntryFilter, JournalModel};
use crate::journal::sentiment::SentimentAnalyzer;
use crate::tasks::models::{TaskFilter, TaskModel};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 365;

/// Latest cross-domain summary for a user. One document per user, overwritten on every
/// request, so `id` is derived from the user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub id: String,
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub fitness: FitnessStats,
    pub goals: GoalStats,
    pub tasks: TaskStats,
    pub journal: JournalStats,
    pub activities: ActivityStats,
    pub habits: HabitStats,
}

impl Document for AnalyticsSnapshot {
    const CONTAINER: &'static str = "analytics";
    const KIND: &'static str = "Analytics snapshot";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

pub fn snapshot_id(user_id: &str) -> String {
    format!("summary-{user_id}")
}

/// Clamps a requested window to `1..=MAX_WINDOW_DAYS`, defaulting when absent.
pub fn window_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, MAX_WINDOW_DAYS)
}

pub struct AnalyticsModel {
    client: Arc<CosmosClient>,
    repo: Repository<AnalyticsSnapshot>,
}

impl AnalyticsModel {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            repo: Repository::new(client.clone()),
            client,
        }
    }

    /// Fitness stats for the `days` days ending today.
    pub async fn fitness_stats(&self, user_id: &str, days: u32) -> Result<FitnessStats, AppError> {
        let window = Window::ending(Utc::now().date_naive(), days);
        let records = FitnessModel::new(self.client.clone())
            .list_records(
                user_id,
                &FitnessFilter {
                    kind: None,
                    from: Some(window.from),
                    to: Some(window.to),
                },
            )
            .await?;
        Ok(compute_fitness_stats(&records))
    }

    /// Aggregates every domain over the window and stores the result as the user's snapshot.
    pub async fn build_snapshot(
        &self,
        user_id: &str,
        days: u32,
        sentiment: Arc<dyn SentimentAnalyzer>,
    ) -> Result<AnalyticsSnapshot, AppError> {
        let window = Window::ending(Utc::now().date_naive(), days);

        let fitness = self.fitness_stats(user_id, days).await?;
        let goals = GoalModel::new(self.client.clone()).all(user_id).await?;
        let tasks = TaskModel::new(self.client.clone())
            .list_tasks(user_id, &TaskFilter::default())
            .await?;
        let entries = JournalModel::new(self.client.clone(), sentiment)
            .list_entries(
                user_id,
                &EntryFilter {
                    tag: None,
                    from: Some(window.from),
                    to: Some(window.to),
                },
            )
            .await?;
        let activities = ActivityModel::new(self.client.clone())
            .in_range(user_id, None, Some(window.from), Some(window.to))
            .await?;
        let habits = HabitModel::new(self.client.clone()).all(user_id, None).await?;

        let snapshot = AnalyticsSnapshot {
            id: snapshot_id(user_id),
            user_id: user_id.to_string(),
            generated_at: Utc::now(),
            window_days: days,
            fitness,
            goals: compute_goal_stats(&goals),
            tasks: compute_task_stats(&tasks, window),
            journal: compute_journal_stats(&entries),
            activities: compute_activity_stats(&activities),
            habits: compute_habit_stats(&habits, window),
        };
        let snapshot = self.repo.upsert(&snapshot).await?;
        info!(user_id, days, "Stored analytics snapshot");
        Ok(snapshot)
    }
}
