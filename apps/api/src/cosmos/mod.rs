// Document store layer.
// Every container is reached through the `Container` trait; the backing store is either
// the Cosmos DB REST API or an in-memory mock, chosen once by `CosmosClient`.

pub mod client;
pub mod mock;
pub mod repository;
pub mod rest;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use client::{CosmosClient, StorageMode};
pub use repository::{Document, Repository};

/// Field every document is partitioned by.
pub const PARTITION_KEY_FIELD: &str = "userId";
pub const PARTITION_KEY_PATH: &str = "/userId";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entity with the specified id does not exist")]
    NotFound,

    #[error("Entity with the specified id already exists")]
    Conflict,

    #[error("Document is missing partition key field '{0}'")]
    MissingPartitionKey(String),

    #[error("Cosmos DB returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Cosmos-style status code, so callers can branch on `404`/`409` whatever the backend.
    pub fn code(&self) -> u16 {
        match self {
            StoreError::NotFound => 404,
            StoreError::Conflict => 409,
            StoreError::MissingPartitionKey(_) => 400,
            StoreError::Status { code, .. } => *code,
            StoreError::Http(e) => e.status().map(|s| s.as_u16()).unwrap_or(500),
            StoreError::Serialization(_) | StoreError::Config(_) => 500,
        }
    }

    pub fn from_status(code: u16, message: String) -> Self {
        match code {
            404 => StoreError::NotFound,
            409 => StoreError::Conflict,
            _ => StoreError::Status { code, message },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

/// A parameterized Cosmos SQL query, serialized verbatim as the REST query body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SqlQuery {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

impl SqlQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.push(SqlParameter {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// A logical partitioned collection of JSON documents.
#[async_trait]
pub trait Container: Send + Sync {
    fn id(&self) -> &str;

    /// Inserts a new document, assigning an id when missing.
    async fn create_item(&self, item: Value) -> Result<Value, StoreError>;

    /// Runs a query; `partition_key` scopes it to one partition when known.
    async fn query_items(
        &self,
        query: &SqlQuery,
        partition_key: Option<&str>,
    ) -> Result<Vec<Value>, StoreError>;

    /// Replaces the document with the same id, or inserts it.
    async fn upsert_item(&self, item: Value) -> Result<Value, StoreError>;

    async fn read_item(&self, id: &str, partition_key: &str) -> Result<Value, StoreError>;

    async fn replace_item(
        &self,
        id: &str,
        partition_key: &str,
        item: Value,
    ) -> Result<Value, StoreError>;

    async fn delete_item(&self, id: &str, partition_key: &str) -> Result<(), StoreError>;
}

/// Reads a dotted path (`details.type`) out of a JSON document.
pub(crate) fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}
