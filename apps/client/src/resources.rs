//! Cached queries and optimistic mutations for one API resource.
//!
//! Reads go through the `QueryCache`: fresh entries are served without a request, and a
//! failed fetch is retried once. Mutations update cached lists and details before the
//! request is sent, restore the snapshot if it fails, notify the user either way, and
//! finally invalidate every query of the domain.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{QueryCache, QueryKey};
use crate::error::ClientError;
use crate::transport::Transport;

const QUERY_RETRIES: u32 = 1;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A REST collection at `/api/{DOMAIN}`.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const DOMAIN: &'static str;
    /// Singular label used in notifications.
    const LABEL: &'static str;

    type Create: Serialize + Send + Sync;
    type Update: Serialize + Send + Sync;

    fn id(&self) -> &str;
}

/// User-facing success and failure messages (toasts in a UI).
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Writes notifications to the log; the default when no UI is attached.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        warn!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

/// Page and filters of a list query. Filters are sent as query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub filters: BTreeMap<String, String>,
}

impl ListParams {
    pub fn filter(mut self, name: &str, value: impl ToString) -> Self {
        self.filters.insert(name.to_string(), value.to_string());
        self
    }

    fn query(&self) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            query.push(("pageSize".to_string(), page_size.to_string()));
        }
        query
    }
}

pub struct ResourceClient<R> {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceClient<R> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            cache: self.cache.clone(),
            notifier: self.notifier.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Resource> ResourceClient<R> {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport,
            cache,
            notifier,
            _marker: PhantomData,
        }
    }

    pub fn domain_key() -> QueryKey {
        vec![R::DOMAIN.to_string()]
    }

    pub fn list_key(params: &ListParams) -> QueryKey {
        let mut key = vec![R::DOMAIN.to_string(), "list".to_string()];
        key.extend(params.query().into_iter().map(|(k, v)| format!("{k}={v}")));
        key
    }

    pub fn detail_key(id: &str) -> QueryKey {
        vec![R::DOMAIN.to_string(), "detail".to_string(), id.to_string()]
    }

    fn collection_path() -> String {
        format!("/api/{}", R::DOMAIN)
    }

    fn item_path(id: &str) -> String {
        format!("/api/{}/{id}", R::DOMAIN)
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub async fn list(&self, params: &ListParams) -> Result<Page<R>, ClientError> {
        let key = Self::list_key(params);
        let value = self
            .query(key, Self::collection_path(), params.query())
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn detail(&self, id: &str) -> Result<R, ClientError> {
        let value = self
            .query(Self::detail_key(id), Self::item_path(id), Vec::new())
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn query(
        &self,
        key: QueryKey,
        path: String,
        params: Vec<(String, String)>,
    ) -> Result<Value, ClientError> {
        if let Some(cached) = self.cache.fresh(&key).await {
            return Ok(cached);
        }

        let mut attempt = 0;
        let value = loop {
            match self.transport.send(Method::GET, &path, &params, None).await {
                Ok(value) => break value,
                Err(e) if attempt < QUERY_RETRIES && e.is_retryable() => {
                    attempt += 1;
                    warn!("Query {key:?} failed ({e}), retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        };

        self.cache.set(key, value.clone()).await;
        Ok(value)
    }

    // ── Mutations ──────────────────────────────────────────────────────────

    /// Shows a placeholder item in cached lists until the server answers.
    pub async fn create(&self, input: &R::Create) -> Result<R, ClientError> {
        let body = serde_json::to_value(input)?;
        let mut placeholder = without_nulls(&body);
        placeholder.insert("id".to_string(), Value::String(format!("temp-{}", Uuid::new_v4())));
        let placeholder = Value::Object(placeholder);

        let result = self
            .mutate(
                Method::POST,
                Self::collection_path(),
                Some(body),
                |key, data| {
                    if is_list(key) {
                        insert_into_page(data, placeholder.clone());
                    }
                },
            )
            .await;
        self.finish(result, "created").await
    }

    /// Merges the changed fields into the cached detail and list items.
    pub async fn update(&self, id: &str, update: &R::Update) -> Result<R, ClientError> {
        let body = serde_json::to_value(update)?;
        let patch = without_nulls(&body);

        let result = self
            .mutate(Method::PUT, Self::item_path(id), Some(body), |key, data| {
                if is_list(key) {
                    for item in page_items(data) {
                        if item_id(item) == Some(id) {
                            merge(item, &patch);
                        }
                    }
                } else if key.last().map(String::as_str) == Some(id) {
                    merge(data, &patch);
                }
            })
            .await;
        self.finish(result, "updated").await
    }

    /// Drops the item from cached lists before the request is sent.
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let result = self
            .mutate(Method::DELETE, Self::item_path(id), None, |key, data| {
                if is_list(key) {
                    remove_from_page(data, id);
                }
            })
            .await;

        match result {
            Ok(_) => {
                self.cache.remove(&Self::detail_key(id)).await;
                self.notifier.success(&format!("{} deleted", R::LABEL));
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .error(&format!("Failed to delete {}: {e}", R::LABEL.to_lowercase()));
                Err(e)
            }
        }
    }

    /// Runs a non-CRUD mutation on one item (e.g. a check-in) with the same settle rules.
    pub async fn action(&self, id: &str, action: &str, body: Option<Value>) -> Result<R, ClientError> {
        let path = format!("{}/{action}", Self::item_path(id));
        let result = self.mutate(Method::POST, path, body, |_, _| {}).await;
        self.finish(result, "updated").await
    }

    /// Optimistic write, request, rollback on error, invalidate on settle.
    async fn mutate(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
        optimistic: impl FnMut(&[String], &mut Value),
    ) -> Result<Value, ClientError> {
        let domain = Self::domain_key();
        let snapshot = self.cache.snapshot(&domain).await;
        self.cache.update_matching(&domain, optimistic).await;

        let result = self.transport.send(method, &path, &[], body).await;
        if result.is_err() {
            self.cache.restore(snapshot).await;
        }
        self.cache.invalidate(&domain).await;
        result
    }

    async fn finish(&self, result: Result<Value, ClientError>, verb: &str) -> Result<R, ClientError> {
        let decoded = result.and_then(|value| Ok(serde_json::from_value::<R>(value)?));
        match decoded {
            Ok(item) => {
                self.cache
                    .set(Self::detail_key(item.id()), serde_json::to_value(&item)?)
                    .await;
                self.notifier.success(&format!("{} {verb}", R::LABEL));
                Ok(item)
            }
            Err(e) => {
                let action = if verb == "created" { "create" } else { "update" };
                self.notifier
                    .error(&format!("Failed to {action} {}: {e}", R::LABEL.to_lowercase()));
                Err(e)
            }
        }
    }
}

fn is_list(key: &[String]) -> bool {
    key.get(1).map(String::as_str) == Some("list")
}

fn item_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

fn without_nulls(value: &Value) -> Map<String, Value> {
    value
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn merge(target: &mut Value, patch: &Map<String, Value>) {
    if let Some(fields) = target.as_object_mut() {
        for (k, v) in patch {
            fields.insert(k.clone(), v.clone());
        }
    }
}

fn page_items(page: &mut Value) -> impl Iterator<Item = &mut Value> {
    page.get_mut("items")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
}

fn insert_into_page(page: &mut Value, item: Value) {
    if let Some(items) = page.get_mut("items").and_then(Value::as_array_mut) {
        items.insert(0, item);
        if let Some(total) = page.get("total").and_then(Value::as_u64) {
            page["total"] = Value::from(total + 1);
        }
    }
}

fn remove_from_page(page: &mut Value, id: &str) {
    if let Some(items) = page.get_mut("items").and_then(Value::as_array_mut) {
        let before = items.len();
        items.retain(|item| item_id(item) != Some(id));
        let removed = (before - items.len()) as u64;
        if let Some(total) = page.get("total").and_then(Value::as_u64) {
            page["total"] = Value::from(total.saturating_sub(removed));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::models::{Goal, GoalUpdate, NewGoal};

    /// Replays queued responses and records every request.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub responses: Mutex<VecDeque<Result<Value, ClientError>>>,
        pub requests: Mutex<Vec<(Method, String, Vec<(String, String)>)>>,
    }

    impl FakeTransport {
        pub fn reply(&self, response: Result<Value, ClientError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(
            &self,
            method: Method,
            path: &str,
            query: &[(String, String)],
            _body: Option<Value>,
        ) -> Result<Value, ClientError> {
            self.requests
                .lock()
                .unwrap()
                .push((method, path.to_string(), query.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub messages: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn success(&self, message: &str) {
            self.messages.lock().unwrap().push(format!("ok: {message}"));
        }

        fn error(&self, message: &str) {
            self.messages.lock().unwrap().push(format!("error: {message}"));
        }
    }

    fn goal(id: &str, title: &str, progress: u8) -> Value {
        json!({
            "id": id,
            "userId": "u1",
            "type": "goal",
            "title": title,
            "progress": progress,
            "achieved": progress == 100,
            "date": "2024-05-01T00:00:00Z",
            "createdAt": "2024-05-01T00:00:00Z",
            "updatedAt": "2024-05-01T00:00:00Z"
        })
    }

    fn page(items: Vec<Value>) -> Value {
        let total = items.len();
        json!({"items": items, "total": total, "page": 1, "pageSize": 20})
    }

    struct Fixture {
        transport: Arc<FakeTransport>,
        notifier: Arc<RecordingNotifier>,
        cache: Arc<QueryCache>,
        goals: ResourceClient<Goal>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(FakeTransport::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let cache = Arc::new(QueryCache::default());
        let goals = ResourceClient::new(transport.clone(), cache.clone(), notifier.clone());
        Fixture {
            transport,
            notifier,
            cache,
            goals,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_is_cached_until_stale() {
        let f = fixture();
        f.transport.reply(Ok(page(vec![goal("g1", "Run", 10)])));
        f.transport.reply(Ok(page(vec![])));

        let params = ListParams::default().filter("achieved", false);
        let first = f.goals.list(&params).await.unwrap();
        let second = f.goals.list(&params).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.transport.request_count(), 1);
        assert_eq!(
            f.transport.requests.lock().unwrap()[0].2,
            vec![("achieved".to_string(), "false".to_string())]
        );

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(f.goals.list(&params).await.unwrap().items.is_empty());
        assert_eq!(f.transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_retries_once() {
        let f = fixture();
        let unavailable = || ClientError::Api {
            status: 503,
            message: "down".to_string(),
        };
        f.transport.reply(Err(unavailable()));
        f.transport.reply(Ok(goal("g1", "Run", 0)));
        assert_eq!(f.goals.detail("g1").await.unwrap().title, "Run");
        assert_eq!(f.transport.request_count(), 2);

        f.transport.reply(Err(unavailable()));
        f.transport.reply(Err(unavailable()));
        assert!(f.goals.detail("g2").await.is_err());
        assert_eq!(f.transport.request_count(), 4);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let f = fixture();
        f.transport.reply(Err(ClientError::Api {
            status: 404,
            message: "Goal g9 not found".to_string(),
        }));
        assert!(matches!(
            f.goals.detail("g9").await,
            Err(ClientError::Api { status: 404, .. })
        ));
        assert_eq!(f.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_update_is_optimistic_and_settles() {
        let f = fixture();
        f.transport.reply(Ok(page(vec![goal("g1", "Run", 10)])));
        f.goals.list(&ListParams::default()).await.unwrap();

        f.transport.reply(Ok(goal("g1", "Run", 50)));
        let updated = f
            .goals
            .update(
                "g1",
                &GoalUpdate {
                    progress: Some(50.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.progress, 50);

        let list_key = ResourceClient::<Goal>::list_key(&ListParams::default());
        let cached = f.cache.peek(&list_key).await.unwrap();
        assert_eq!(cached["items"][0]["progress"], 50.0);
        assert!(f.cache.fresh(&list_key).await.is_none());
        assert_eq!(
            f.notifier.messages.lock().unwrap().last().unwrap(),
            "ok: Goal updated"
        );
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back() {
        let f = fixture();
        f.transport.reply(Ok(page(vec![goal("g1", "Run", 10)])));
        f.goals.list(&ListParams::default()).await.unwrap();

        f.transport.reply(Err(ClientError::Api {
            status: 500,
            message: "boom".to_string(),
        }));
        let result = f
            .goals
            .update(
                "g1",
                &GoalUpdate {
                    title: Some("Sprint".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());

        let list_key = ResourceClient::<Goal>::list_key(&ListParams::default());
        let cached = f.cache.peek(&list_key).await.unwrap();
        assert_eq!(cached["items"][0]["title"], "Run");
        let messages = f.notifier.messages.lock().unwrap();
        assert!(messages.last().unwrap().starts_with("error: Failed to update goal"));
    }

    #[tokio::test]
    async fn test_create_inserts_placeholder_then_invalidates() {
        let f = fixture();
        f.transport.reply(Ok(page(vec![goal("g1", "Run", 10)])));
        f.goals.list(&ListParams::default()).await.unwrap();

        f.transport.reply(Ok(goal("g2", "Swim", 0)));
        let created = f
            .goals
            .create(&NewGoal {
                title: "Swim".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, "g2");

        let list_key = ResourceClient::<Goal>::list_key(&ListParams::default());
        let cached = f.cache.peek(&list_key).await.unwrap();
        assert_eq!(cached["total"], 2);
        assert!(cached["items"][0]["id"].as_str().unwrap().starts_with("temp-"));
        assert!(f.cache.fresh(&list_key).await.is_none());
        assert!(f
            .cache
            .fresh(&ResourceClient::<Goal>::detail_key("g2"))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_removes_from_lists() {
        let f = fixture();
        f.transport.reply(Ok(page(vec![goal("g1", "Run", 10), goal("g2", "Swim", 0)])));
        f.goals.list(&ListParams::default()).await.unwrap();

        f.transport.reply(Ok(Value::Null));
        f.goals.delete("g1").await.unwrap();

        let list_key = ResourceClient::<Goal>::list_key(&ListParams::default());
        let cached = f.cache.peek(&list_key).await.unwrap();
        assert_eq!(cached["total"], 1);
        assert_eq!(cached["items"][0]["id"], "g2");
        let (method, path, _) = f.transport.requests.lock().unwrap()[1].clone();
        assert_eq!(method, Method::DELETE);
        assert_eq!(path, "/api/goals/g1");
    }
}
