use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cosmos::{CosmosClient, Document, Repository, SqlQuery};
use crate::errors::AppError;
use crate::goals::models::dated_first;
use crate::models::{normalize_tags, required_text, Attachment};

/// Any status may follow any other; there is no enforced workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Document for Task {
    const CONTAINER: &'static str = "tasks";
    const KIND: &'static str = "Task";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Task {
    /// Changes status, stamping `completedAt` on entry to `completed` and clearing it on exit.
    fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if status == TaskStatus::Completed && self.status != TaskStatus::Completed {
            self.completed_at = Some(now);
        } else if status != TaskStatus::Completed {
            self.completed_at = None;
        }
        self.status = status;
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub project_id: Option<String>,
    pub tag: Option<String>,
}

pub struct TaskModel {
    repo: Repository<Task>,
}

impl TaskModel {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            repo: Repository::new(client),
        }
    }

    pub async fn create_task(&self, user_id: &str, input: NewTask) -> Result<Task, AppError> {
        let title = required_text(&input.title, "title")?;
        let now = Utc::now();
        let mut task = Task {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            project_id: input.project_id,
            title,
            description: input.description,
            status: TaskStatus::Todo,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            tags: normalize_tags(input.tags),
            attachments: input.attachments,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        task.set_status(input.status.unwrap_or_default(), now);

        let task = self.repo.insert(&task).await?;
        info!(user_id, id = %task.id, "Created task");
        Ok(task)
    }

    pub async fn get_task(&self, user_id: &str, id: &str) -> Result<Task, AppError> {
        self.repo.find(user_id, id).await
    }

    /// Tasks matching every given filter, ordered by due date (undated last) then creation.
    pub async fn list_tasks(&self, user_id: &str, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let mut text = String::from("SELECT * FROM c WHERE c.userId = @userId");
        if filter.status.is_some() {
            text.push_str(" AND c.status = @status");
        }
        if filter.priority.is_some() {
            text.push_str(" AND c.priority = @priority");
        }
        if filter.project_id.is_some() {
            text.push_str(" AND c.projectId = @projectId");
        }
        let mut query = SqlQuery::new(text).param("@userId", user_id);
        if let Some(status) = filter.status {
            query = query.param("@status", status.as_str());
        }
        if let Some(priority) = filter.priority {
            query = query.param("@priority", priority.as_str());
        }
        if let Some(project_id) = &filter.project_id {
            query = query.param("@projectId", project_id.as_str());
        }

        let mut tasks: Vec<Task> = self
            .repo
            .query(user_id, query)
            .await?
            .into_iter()
            .filter(|t| filter.tag.as_ref().map_or(true, |tag| t.tags.contains(tag)))
            .collect();
        tasks.sort_by(|a, b| dated_first(a.due_date, b.due_date).then(a.created_at.cmp(&b.created_at)));
        Ok(tasks)
    }

    pub async fn update_task(
        &self,
        user_id: &str,
        id: &str,
        update: TaskUpdate,
    ) -> Result<Task, AppError> {
        let mut task = self.repo.find(user_id, id).await?;
        let now = Utc::now();

        if let Some(title) = update.title {
            task.title = required_text(&title, "title")?;
        }
        if let Some(description) = update.description {
            task.description = Some(description);
        }
        if let Some(project_id) = update.project_id {
            task.project_id = Some(project_id);
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(due_date) = update.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(tags) = update.tags {
            task.tags = normalize_tags(tags);
        }
        if let Some(attachments) = update.attachments {
            task.attachments = attachments;
        }
        if let Some(status) = update.status {
            if status != task.status {
                info!(user_id, id, from = task.status.as_str(), to = status.as_str(), "Task status changed");
            }
            task.set_status(status, now);
        }
        task.updated_at = now;

        self.repo.replace(&task).await
    }

    pub async fn delete_task(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.repo.remove(user_id, id).await?;
        info!(user_id, id, "Deleted task");
        Ok(())
    }
}
