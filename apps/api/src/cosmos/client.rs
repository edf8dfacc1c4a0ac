use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::mock::MockDatabase;
use super::rest::{CosmosConnection, CosmosRestContainer};
use super::{Container, StoreError, PARTITION_KEY_PATH};
use crate::config::CosmosConfig;

/// One container per logical resource, all partitioned by `/userId`.
pub const CONTAINER_NAMES: [&str; 9] = [
    "users",
    "fitness",
    "tasks",
    "development",
    "analytics",
    "files",
    "journal",
    "activities",
    "habits",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Cosmos,
    Mock,
}

/// Entry point to the document store.
///
/// Picks the Cosmos REST backend or the in-memory mock at construction, hands out
/// lazily-initialized container handles, and degrades to mock containers whenever
/// initialization against the real account fails.
pub struct CosmosClient {
    connection: Option<CosmosConnection>,
    mock: MockDatabase,
    containers: RwLock<HashMap<String, Arc<dyn Container>>>,
    fell_back: AtomicBool,
}

impl CosmosClient {
    pub fn new(config: &CosmosConfig) -> Self {
        let connection = if config.use_mock {
            info!("Using in-memory mock database");
            None
        } else {
            match (&config.endpoint, &config.key) {
                (Some(endpoint), Some(key)) => {
                    match CosmosConnection::new(endpoint, key, &config.database) {
                        Ok(connection) => {
                            info!(endpoint = %endpoint, database = %config.database, "Using Cosmos DB");
                            Some(connection)
                        }
                        Err(e) => {
                            warn!("Cosmos DB client could not be created, using mock database: {e}");
                            None
                        }
                    }
                }
                _ => None,
            }
        };

        Self {
            connection,
            mock: MockDatabase::new(),
            containers: RwLock::new(HashMap::new()),
            fell_back: AtomicBool::new(false),
        }
    }

    /// A client that only ever uses mock containers.
    pub fn mock() -> Self {
        Self {
            connection: None,
            mock: MockDatabase::new(),
            containers: RwLock::new(HashMap::new()),
            fell_back: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> StorageMode {
        if self.connection.is_some() && !self.fell_back.load(Ordering::Relaxed) {
            StorageMode::Cosmos
        } else {
            StorageMode::Mock
        }
    }

    /// Creates the database and every known container. Safe to call repeatedly.
    /// Any failure switches the whole client to mock containers.
    pub async fn initialize(&self) -> StorageMode {
        if let Some(connection) = self.active_connection() {
            if let Err(e) = connection.ensure_database().await {
                warn!("Cosmos DB initialization failed, falling back to mock database: {e}");
                self.fell_back.store(true, Ordering::Relaxed);
            }
        }

        for name in CONTAINER_NAMES {
            self.get_container(name).await;
        }

        let mode = self.mode();
        info!(mode = ?mode, containers = CONTAINER_NAMES.len(), "Document store initialized");
        mode
    }

    /// Returns the named container, initializing it on first access.
    pub async fn get_container(&self, name: &str) -> Arc<dyn Container> {
        if let Some(existing) = self.containers.read().await.get(name) {
            return existing.clone();
        }

        let container = self.open_container(name).await;

        let mut containers = self.containers.write().await;
        containers
            .entry(name.to_string())
            .or_insert(container)
            .clone()
    }

    fn active_connection(&self) -> Option<&CosmosConnection> {
        if self.fell_back.load(Ordering::Relaxed) {
            None
        } else {
            self.connection.as_ref()
        }
    }

    async fn open_container(&self, name: &str) -> Arc<dyn Container> {
        let Some(connection) = self.active_connection() else {
            let mock: Arc<dyn Container> = self.mock.container(name).await;
            return mock;
        };

        let container: Arc<dyn Container> = match ensure_container(connection, name).await {
            Ok(()) => Arc::new(CosmosRestContainer::new(connection.clone(), name)),
            Err(e) => {
                warn!(container = %name, "Container initialization failed, using mock container: {e}");
                self.mock.container(name).await
            }
        };
        container
    }
}

/// Creates the container, creating the database first when the account reports it missing.
async fn ensure_container(connection: &CosmosConnection, name: &str) -> Result<(), StoreError> {
    match connection.ensure_container(name, PARTITION_KEY_PATH).await {
        Err(StoreError::NotFound) => {
            connection.ensure_database().await?;
            connection.ensure_container(name, PARTITION_KEY_PATH).await
        }
        other => other,
    }
}
