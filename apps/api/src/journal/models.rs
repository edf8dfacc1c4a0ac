use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cosmos::{CosmosClient, Document, Repository, SqlQuery};
use crate::errors::AppError;
use crate::journal::sentiment::SentimentAnalyzer;
use crate::models::{normalize_tags, required_text, Attachment};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// In `[-1, 1]`, recomputed whenever `content` changes.
    pub sentiment_score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for JournalEntry {
    const CONTAINER: &'static str = "journal";
    const KIND: &'static str = "Journal entry";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub mood: Option<String>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFilter {
    pub tag: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EntryFilter {
    fn matches(&self, entry: &JournalEntry) -> bool {
        let day = entry.created_at.date_naive();
        self.tag.as_ref().map_or(true, |tag| entry.tags.contains(tag))
            && self.from.map_or(true, |from| day >= from)
            && self.to.map_or(true, |to| day <= to)
    }
}

pub struct JournalModel {
    repo: Repository<JournalEntry>,
    sentiment: Arc<dyn SentimentAnalyzer>,
}

impl JournalModel {
    pub fn new(client: Arc<CosmosClient>, sentiment: Arc<dyn SentimentAnalyzer>) -> Self {
        Self {
            repo: Repository::new(client),
            sentiment,
        }
    }

    pub async fn create_entry(&self, user_id: &str, input: NewEntry) -> Result<JournalEntry, AppError> {
        let content = required_text(&input.content, "content")?;
        let sentiment_score = self.sentiment.score(&content).await;
        let now = Utc::now();

        let entry = JournalEntry {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: input.title,
            content,
            mood: input.mood,
            sentiment_score,
            tags: normalize_tags(input.tags),
            attachments: input.attachments,
            created_at: now,
            updated_at: now,
        };
        let entry = self.repo.insert(&entry).await?;
        info!(user_id, id = %entry.id, sentiment = entry.sentiment_score, "Created journal entry");
        Ok(entry)
    }

    pub async fn get_entry(&self, user_id: &str, id: &str) -> Result<JournalEntry, AppError> {
        self.repo.find(user_id, id).await
    }

    /// Newest first.
    pub async fn list_entries(
        &self,
        user_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<JournalEntry>, AppError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(AppError::validation("from must not be after to"));
            }
        }
        let query = SqlQuery::new("SELECT * FROM c WHERE c.userId = @userId")
            .param("@userId", user_id);
        let mut entries: Vec<JournalEntry> = self
            .repo
            .query(user_id, query)
            .await?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    pub async fn update_entry(
        &self,
        user_id: &str,
        id: &str,
        update: EntryUpdate,
    ) -> Result<JournalEntry, AppError> {
        let mut entry = self.repo.find(user_id, id).await?;

        if let Some(content) = update.content {
            let content = required_text(&content, "content")?;
            if content != entry.content {
                entry.sentiment_score = self.sentiment.score(&content).await;
                entry.content = content;
            }
        }
        if let Some(title) = update.title {
            entry.title = Some(title);
        }
        if let Some(mood) = update.mood {
            entry.mood = Some(mood);
        }
        if let Some(tags) = update.tags {
            entry.tags = normalize_tags(tags);
        }
        if let Some(attachments) = update.attachments {
            entry.attachments = attachments;
        }
        entry.updated_at = Utc::now();

        self.repo.replace(&entry).await
    }

    pub async fn delete_entry(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.repo.remove(user_id, id).await?;
        info!(user_id, id, "Deleted journal entry");
        Ok(())
    }
}
