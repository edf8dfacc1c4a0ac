//! In-memory stand-in for Cosmos DB containers.
//!
//! Used when no cloud credentials are configured or when container initialization fails.
//! Items live in an unbounded vector per container. Queries support only `c.<field> = @param`
//! conjunctions; anything else in the query text (ranges, `CONTAINS`, `ORDER BY`) is ignored.
//! Partition keys are accepted and ignored, so tenant isolation is left to the model layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{field, Container, SqlQuery, StoreError};

pub struct MockContainer {
    id: String,
    items: RwLock<Vec<Value>>,
}

impl MockContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

fn item_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

/// Ensures the item is an object carrying a string id, generating one when absent.
fn with_id(mut item: Value) -> Result<Value, StoreError> {
    let object = item
        .as_object_mut()
        .ok_or_else(|| StoreError::Config("documents must be JSON objects".to_string()))?;
    let has_id = object
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !has_id {
        object.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    Ok(item)
}

#[async_trait]
impl Container for MockContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn create_item(&self, item: Value) -> Result<Value, StoreError> {
        let item = with_id(item)?;
        let mut items = self.items.write().await;
        if items.iter().any(|existing| item_id(existing) == item_id(&item)) {
            return Err(StoreError::Conflict);
        }
        items.push(item.clone());
        debug!(container = %self.id, total = items.len(), "mock create");
        Ok(item)
    }

    async fn query_items(
        &self,
        query: &SqlQuery,
        _partition_key: Option<&str>,
    ) -> Result<Vec<Value>, StoreError> {
        let filters = equality_filters(&query.query);
        let items = self.items.read().await;
        let matches: Vec<Value> = items
            .iter()
            .filter(|item| {
                filters.iter().all(|(path, param)| match query.parameter(param) {
                    Some(expected) => field(item, path) == Some(expected),
                    None => false,
                })
            })
            .cloned()
            .collect();
        debug!(container = %self.id, matched = matches.len(), "mock query");
        Ok(matches)
    }

    async fn upsert_item(&self, item: Value) -> Result<Value, StoreError> {
        let item = with_id(item)?;
        let mut items = self.items.write().await;
        match items
            .iter_mut()
            .find(|existing| item_id(existing) == item_id(&item))
        {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        Ok(item)
    }

    async fn read_item(&self, id: &str, _partition_key: &str) -> Result<Value, StoreError> {
        let items = self.items.read().await;
        items
            .iter()
            .find(|item| item_id(item) == Some(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn replace_item(
        &self,
        id: &str,
        _partition_key: &str,
        item: Value,
    ) -> Result<Value, StoreError> {
        let mut item = item;
        if let Some(object) = item.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
        let mut items = self.items.write().await;
        let existing = items
            .iter_mut()
            .find(|existing| item_id(existing) == Some(id))
            .ok_or(StoreError::NotFound)?;
        *existing = item.clone();
        Ok(item)
    }

    async fn delete_item(&self, id: &str, _partition_key: &str) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let position = items
            .iter()
            .position(|item| item_id(item) == Some(id))
            .ok_or(StoreError::NotFound)?;
        items.remove(position);
        Ok(())
    }
}

/// Extracts `(field path, parameter name)` pairs from every `c.<path> = @<param>` in the query.
fn equality_filters(query: &str) -> Vec<(String, String)> {
    let is_token = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '@');
    let mut filters = Vec::new();

    for (idx, ch) in query.char_indices() {
        if ch != '=' {
            continue;
        }
        let before = query[..idx].trim_end();
        if before.ends_with(['!', '<', '>']) {
            continue;
        }
        let lhs = before.rsplit(|c: char| !is_token(c)).next().unwrap_or("");
        let rhs: String = query[idx + 1..]
            .trim_start()
            .chars()
            .take_while(|c| is_token(*c))
            .collect();

        if let Some(path) = lhs.strip_prefix("c.") {
            if rhs.starts_with('@') && rhs.len() > 1 {
                filters.push((path.to_string(), rhs));
            }
        }
    }

    filters
}

/// Named mock containers shared by every caller of the same name.
#[derive(Default)]
pub struct MockDatabase {
    containers: RwLock<HashMap<String, Arc<MockContainer>>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn container(&self, name: &str) -> Arc<MockContainer> {
        if let Some(existing) = self.containers.read().await.get(name) {
            return existing.clone();
        }
        let mut containers = self.containers.write().await;
        containers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MockContainer::new(name)))
            .clone()
    }

    pub async fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.containers.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_missing_id() {
        let container = MockContainer::new("tasks");
        let created = container
            .create_item(json!({"userId": "u1", "title": "x"}))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap();
        assert!(!id.is_empty());
        assert_eq!(container.read_item(id, "u1").await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_ids() {
        let container = MockContainer::new("tasks");
        container.create_item(json!({"id": "a"})).await.unwrap();
        let err = container.create_item(json!({"id": "a"})).await.unwrap_err();
        assert_eq!(err.code(), 409);
    }

    #[tokio::test]
    async fn test_missing_items_report_404() {
        let container = MockContainer::new("fitness");
        assert_eq!(container.read_item("nope", "u1").await.unwrap_err().code(), 404);
        assert_eq!(
            container
                .replace_item("nope", "u1", json!({}))
                .await
                .unwrap_err()
                .code(),
            404
        );
        assert_eq!(container.delete_item("nope", "u1").await.unwrap_err().code(), 404);
    }

    #[tokio::test]
    async fn test_partition_key_is_ignored() {
        let container = MockContainer::new("fitness");
        container
            .create_item(json!({"id": "a", "userId": "owner"}))
            .await
            .unwrap();
        let read = container.read_item("a", "someone-else").await.unwrap();
        assert_eq!(read["userId"], "owner");
    }

    #[tokio::test]
    async fn test_query_filters_on_named_parameters() {
        let container = MockContainer::new("fitness");
        for (id, user, kind) in [("1", "u1", "workout"), ("2", "u1", "goal"), ("3", "u2", "workout")] {
            container
                .create_item(json!({"id": id, "userId": user, "type": kind}))
                .await
                .unwrap();
        }

        let query = SqlQuery::new(
            "SELECT * FROM c WHERE c.userId = @userId AND c.type = @type ORDER BY c.date DESC",
        )
        .param("@userId", "u1")
        .param("@type", "workout");
        let results = container.query_items(&query, Some("u1")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["id"], "1");

        let by_user = SqlQuery::new("SELECT * FROM c WHERE c.userId=@userId").param("@userId", "u1");
        assert_eq!(container.query_items(&by_user, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_ignores_range_conditions() {
        let container = MockContainer::new("fitness");
        container
            .create_item(json!({"id": "1", "userId": "u1", "duration": 10}))
            .await
            .unwrap();
        let query = SqlQuery::new("SELECT * FROM c WHERE c.userId = @userId AND c.duration >= @min")
            .param("@userId", "u1")
            .param("@min", 60);
        assert_eq!(container.query_items(&query, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_or_appends() {
        let container = MockContainer::new("users");
        container.upsert_item(json!({"id": "a", "n": 1})).await.unwrap();
        container.upsert_item(json!({"id": "a", "n": 2})).await.unwrap();
        container.upsert_item(json!({"id": "b", "n": 3})).await.unwrap();
        assert_eq!(container.len().await, 2);
        assert_eq!(container.read_item("a", "a").await.unwrap()["n"], 2);
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let container = MockContainer::new("tasks");
        container.create_item(json!({"id": "a", "v": 1})).await.unwrap();
        let replaced = container
            .replace_item("a", "u1", json!({"v": 2}))
            .await
            .unwrap();
        assert_eq!(replaced, json!({"id": "a", "v": 2}));
        container.delete_item("a", "u1").await.unwrap();
        assert_eq!(container.len().await, 0);
    }

    #[test]
    fn test_equality_filter_extraction() {
        let filters = equality_filters(
            "SELECT * FROM c WHERE c.userId = @userId AND c.date >= @from AND c.meta.kind=@kind",
        );
        assert_eq!(
            filters,
            vec![
                ("userId".to_string(), "@userId".to_string()),
                ("meta.kind".to_string(), "@kind".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_database_shares_containers_by_name() {
        let db = MockDatabase::new();
        let a = db.container("fitness").await;
        a.create_item(json!({"id": "x"})).await.unwrap();
        let b = db.container("fitness").await;
        assert_eq!(b.len().await, 1);
        assert_eq!(db.container_names().await, vec!["fitness".to_string()]);
    }
}
