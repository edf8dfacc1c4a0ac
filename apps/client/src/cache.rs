//! Query cache keyed by `[domain, kind, ...params]`.
//!
//! Entries are fresh for `stale_time` after they were written; stale or invalidated
//! entries are refetched on the next read. Invalidation and snapshots work on key prefixes,
//! so `["habits"]` covers every list and detail query of that domain.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

pub type QueryKey = Vec<String>;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    updated_at: Instant,
    invalidated: bool,
}

/// Saved copies of every entry under a prefix, for rolling back optimistic writes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    prefix: QueryKey,
    entries: Vec<(QueryKey, CacheEntry)>,
}

pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    stale_time: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

fn has_prefix(key: &[String], prefix: &[String]) -> bool {
    key.len() >= prefix.len() && key.iter().zip(prefix).all(|(a, b)| a == b)
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stale_time,
        }
    }

    /// Cached data that may be served without a fetch.
    pub async fn fresh(&self, key: &[String]) -> Option<Value> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| !e.invalidated && e.updated_at.elapsed() < self.stale_time)
            .map(|e| e.data.clone())
    }

    /// Cached data regardless of staleness.
    pub async fn peek(&self, key: &[String]) -> Option<Value> {
        self.entries.read().await.get(key).map(|e| e.data.clone())
    }

    pub async fn set(&self, key: QueryKey, data: Value) {
        self.entries.write().await.insert(
            key,
            CacheEntry {
                data,
                updated_at: Instant::now(),
                invalidated: false,
            },
        );
    }

    pub async fn remove(&self, key: &[String]) {
        self.entries.write().await.remove(key);
    }

    /// Marks every entry under `prefix` stale. Data stays readable through `peek`.
    pub async fn invalidate(&self, prefix: &[String]) -> usize {
        let mut entries = self.entries.write().await;
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if has_prefix(key, prefix) {
                entry.invalidated = true;
                count += 1;
            }
        }
        debug!(prefix = ?prefix, count, "Invalidated queries");
        count
    }

    /// Applies `f` to the data of every entry under `prefix`, keeping timestamps.
    pub async fn update_matching(&self, prefix: &[String], mut f: impl FnMut(&[String], &mut Value)) {
        let mut entries = self.entries.write().await;
        for (key, entry) in entries.iter_mut() {
            if has_prefix(key, prefix) {
                f(key, &mut entry.data);
            }
        }
    }

    pub async fn snapshot(&self, prefix: &[String]) -> Snapshot {
        let entries = self.entries.read().await;
        Snapshot {
            prefix: prefix.to_vec(),
            entries: entries
                .iter()
                .filter(|(key, _)| has_prefix(key, prefix))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
        }
    }

    /// Puts the prefix back exactly as it was when `snapshot` was taken.
    pub async fn restore(&self, snapshot: Snapshot) {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !has_prefix(key, &snapshot.prefix));
        entries.extend(snapshot.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(parts: &[&str]) -> QueryKey {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_go_stale() {
        let cache = QueryCache::default();
        cache.set(key(&["goals", "detail", "g1"]), json!({"id": "g1"})).await;
        assert!(cache.fresh(&key(&["goals", "detail", "g1"])).await.is_some());

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        assert!(cache.fresh(&key(&["goals", "detail", "g1"])).await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.fresh(&key(&["goals", "detail", "g1"])).await.is_none());
        assert!(cache.peek(&key(&["goals", "detail", "g1"])).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_by_prefix() {
        let cache = QueryCache::default();
        cache.set(key(&["habits", "list", "1"]), json!([])).await;
        cache.set(key(&["habits", "detail", "h1"]), json!({})).await;
        cache.set(key(&["goals", "list", "1"]), json!([])).await;

        assert_eq!(cache.invalidate(&key(&["habits"])).await, 2);
        assert!(cache.fresh(&key(&["habits", "list", "1"])).await.is_none());
        assert!(cache.fresh(&key(&["goals", "list", "1"])).await.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_restore_undoes_changes() {
        let cache = QueryCache::default();
        cache.set(key(&["activities", "detail", "a1"]), json!({"title": "Walk"})).await;

        let snapshot = cache.snapshot(&key(&["activities"])).await;
        cache
            .update_matching(&key(&["activities"]), |_, data| data["title"] = json!("Run"))
            .await;
        cache.set(key(&["activities", "detail", "a2"]), json!({})).await;

        cache.restore(snapshot).await;
        assert_eq!(
            cache.peek(&key(&["activities", "detail", "a1"])).await,
            Some(json!({"title": "Walk"}))
        );
        assert!(cache.peek(&key(&["activities", "detail", "a2"])).await.is_none());
    }
}
