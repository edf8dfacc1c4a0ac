//! Typed access to one container.
//!
//! All model classes go through `Repository<T>`, which resolves its container per call,
//! scopes reads to the caller's partition and rejects documents owned by someone else
//! (the mock store ignores partition keys, so ownership is checked here).

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{Container, CosmosClient, SqlQuery, StoreError, PARTITION_KEY_FIELD};
use crate::errors::AppError;

pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Container the documents live in.
    const CONTAINER: &'static str;
    /// Human-readable name used in not-found messages.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn user_id(&self) -> &str;

    /// Whether a raw document stored in `CONTAINER` is of this type.
    fn accepts(_document: &Value) -> bool {
        true
    }
}

pub struct Repository<T> {
    client: Arc<CosmosClient>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            client,
            _marker: PhantomData,
        }
    }

    async fn container(&self) -> Arc<dyn Container> {
        self.client.get_container(T::CONTAINER).await
    }

    pub async fn insert(&self, document: &T) -> Result<T, AppError> {
        let value = serde_json::to_value(document).map_err(StoreError::from)?;
        let created = self.container().await.create_item(value).await?;
        decode(created)
    }

    pub async fn find(&self, user_id: &str, id: &str) -> Result<T, AppError> {
        let document = match self.container().await.read_item(id, user_id).await {
            Ok(document) => document,
            Err(StoreError::NotFound) => return Err(AppError::not_found(T::KIND, id)),
            Err(e) => return Err(e.into()),
        };

        let owner = document.get(PARTITION_KEY_FIELD).and_then(Value::as_str);
        if owner != Some(user_id) {
            tracing::warn!(kind = T::KIND, id, "Rejected access to a document owned by another user");
            return Err(AppError::Forbidden);
        }
        if !T::accepts(&document) {
            return Err(AppError::not_found(T::KIND, id));
        }
        decode(document)
    }

    /// Runs `query` inside the caller's partition.
    pub async fn query(&self, user_id: &str, query: SqlQuery) -> Result<Vec<T>, AppError> {
        let documents = self
            .container()
            .await
            .query_items(&query, Some(user_id))
            .await?;
        documents
            .into_iter()
            .filter(|d| T::accepts(d))
            .map(decode)
            .collect()
    }

    pub async fn all_for_user(&self, user_id: &str) -> Result<Vec<T>, AppError> {
        let query = SqlQuery::new("SELECT * FROM c WHERE c.userId = @userId")
            .param("@userId", user_id);
        self.query(user_id, query).await
    }

    pub async fn replace(&self, document: &T) -> Result<T, AppError> {
        let value = serde_json::to_value(document).map_err(StoreError::from)?;
        let replaced = self
            .container()
            .await
            .replace_item(document.id(), document.user_id(), value)
            .await?;
        decode(replaced)
    }

    pub async fn upsert(&self, document: &T) -> Result<T, AppError> {
        let value = serde_json::to_value(document).map_err(StoreError::from)?;
        let stored = self.container().await.upsert_item(value).await?;
        decode(stored)
    }

    /// Deletes after the same ownership check as `find`.
    pub async fn remove(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.find(user_id, id).await?;
        match self.container().await.delete_item(id, user_id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(AppError::not_found(T::KIND, id)),
            Err(e) => Err(e.into()),
        }
    }
}

fn decode<T: DeserializeOwned>(document: Value) -> Result<T, AppError> {
    Ok(serde_json::from_value(document).map_err(StoreError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        id: String,
        user_id: String,
        kind: String,
        text: String,
    }

    impl Document for Note {
        const CONTAINER: &'static str = "development";
        const KIND: &'static str = "Note";

        fn id(&self) -> &str {
            &self.id
        }

        fn user_id(&self) -> &str {
            &self.user_id
        }

        fn accepts(document: &Value) -> bool {
            document.get("kind").and_then(Value::as_str) == Some("note")
        }
    }

    fn note(id: &str, user: &str) -> Note {
        Note {
            id: id.to_string(),
            user_id: user.to_string(),
            kind: "note".to_string(),
            text: "hello".to_string(),
        }
    }

    fn repo() -> Repository<Note> {
        Repository::new(Arc::new(CosmosClient::mock()))
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let repo = repo();
        let created = repo.insert(&note("n1", "u1")).await.unwrap();
        assert_eq!(repo.find("u1", "n1").await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_foreign_document_is_forbidden() {
        let repo = repo();
        repo.insert(&note("n1", "owner")).await.unwrap();
        assert!(matches!(
            repo.find("intruder", "n1").await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            repo.remove("intruder", "n1").await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_other_kinds_are_not_found() {
        let repo = repo();
        let container = repo.container().await;
        container
            .create_item(serde_json::json!({"id": "x", "userId": "u1", "kind": "other"}))
            .await
            .unwrap();
        assert!(matches!(
            repo.find("u1", "x").await,
            Err(AppError::NotFound(_))
        ));
        assert!(repo.all_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_then_find_is_not_found() {
        let repo = repo();
        repo.insert(&note("n1", "u1")).await.unwrap();
        repo.remove("u1", "n1").await.unwrap();
        assert!(matches!(
            repo.find("u1", "n1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_all_for_user_scopes_to_owner() {
        let repo = repo();
        repo.insert(&note("a", "u1")).await.unwrap();
        repo.insert(&note("b", "u2")).await.unwrap();
        let mine = repo.all_for_user("u1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "a");
    }
}
