//! Cosmos DB REST API backend.
//!
//! Requests are signed with the account master key (HMAC-SHA256 over verb, resource type,
//! resource link and date). Documents are routed by the partition key header; queries follow
//! `x-ms-continuation` until the result set is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use ring::hmac;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Container, SqlQuery, StoreError, PARTITION_KEY_FIELD};

const API_VERSION: &str = "2018-12-31";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Signed HTTP access to one Cosmos DB account and database.
#[derive(Clone)]
pub struct CosmosConnection {
    http: Client,
    endpoint: String,
    key: hmac::Key,
    database: String,
}

impl CosmosConnection {
    pub fn new(endpoint: &str, master_key: &str, database: &str) -> Result<Self, StoreError> {
        let decoded = STANDARD
            .decode(master_key.trim())
            .map_err(|e| StoreError::Config(format!("COSMOS_DB_KEY is not valid base64: {e}")))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: hmac::Key::new(hmac::HMAC_SHA256, &decoded),
            database: database.to_string(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn request(
        &self,
        method: Method,
        resource_type: &str,
        resource_link: &str,
        path: &str,
    ) -> RequestBuilder {
        let date = http_date(Utc::now());
        let token = authorization_token(
            &self.key,
            method.as_str(),
            resource_type,
            resource_link,
            &date,
        );
        self.http
            .request(method, format!("{}/{}", self.endpoint, path))
            .header("authorization", token)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
    }

    /// Creates the database; an existing database counts as success.
    pub async fn ensure_database(&self) -> Result<(), StoreError> {
        let response = self
            .request(Method::POST, "dbs", "", "dbs")
            .json(&json!({ "id": self.database }))
            .send()
            .await?;
        match check(response).await {
            Ok(_) => {
                info!(database = %self.database, "Created Cosmos DB database");
                Ok(())
            }
            Err(StoreError::Conflict) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Creates a container partitioned by `partition_key_path`; an existing one counts as success.
    pub async fn ensure_container(
        &self,
        name: &str,
        partition_key_path: &str,
    ) -> Result<(), StoreError> {
        let db_link = format!("dbs/{}", self.database);
        let response = self
            .request(Method::POST, "colls", &db_link, &format!("{db_link}/colls"))
            .json(&json!({
                "id": name,
                "partitionKey": { "paths": [partition_key_path], "kind": "Hash" }
            }))
            .send()
            .await?;
        match check(response).await {
            Ok(_) => {
                info!(container = %name, "Created Cosmos DB container");
                Ok(())
            }
            Err(StoreError::Conflict) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// One container reached over the REST API.
pub struct CosmosRestContainer {
    connection: CosmosConnection,
    id: String,
    link: String,
}

impl CosmosRestContainer {
    pub fn new(connection: CosmosConnection, id: &str) -> Self {
        let link = format!("dbs/{}/colls/{}", connection.database(), id);
        Self {
            connection,
            id: id.to_string(),
            link,
        }
    }

    fn document_link(&self, id: &str) -> String {
        format!("{}/docs/{}", self.link, id)
    }

    async fn write_document(&self, item: Value, upsert: bool) -> Result<Value, StoreError> {
        let item = ensure_id(item);
        let partition_key = partition_key_of(&item)?;
        let mut request = self
            .connection
            .request(
                Method::POST,
                "docs",
                &self.link,
                &format!("{}/docs", self.link),
            )
            .header("x-ms-documentdb-partitionkey", partition_header(&partition_key));
        if upsert {
            request = request.header("x-ms-documentdb-is-upsert", "True");
        }
        let response = check(request.json(&item).send().await?).await?;
        Ok(strip_system_properties(response.json().await?))
    }
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

#[async_trait]
impl Container for CosmosRestContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn create_item(&self, item: Value) -> Result<Value, StoreError> {
        self.write_document(item, false).await
    }

    async fn query_items(
        &self,
        query: &SqlQuery,
        partition_key: Option<&str>,
    ) -> Result<Vec<Value>, StoreError> {
        let body = serde_json::to_vec(query)?;
        let mut documents = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .connection
                .request(
                    Method::POST,
                    "docs",
                    &self.link,
                    &format!("{}/docs", self.link),
                )
                .header("content-type", "application/query+json")
                .header("x-ms-documentdb-isquery", "True");
            request = match partition_key {
                Some(pk) => request.header("x-ms-documentdb-partitionkey", partition_header(pk)),
                None => request.header("x-ms-documentdb-query-enablecrosspartition", "True"),
            };
            if let Some(token) = &continuation {
                request = request.header("x-ms-continuation", token.as_str());
            }

            let response = check(request.body(body.clone()).send().await?).await?;
            continuation = response
                .headers()
                .get("x-ms-continuation")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let page: QueryPage = response.json().await?;
            documents.extend(page.documents.into_iter().map(strip_system_properties));

            if continuation.is_none() {
                break;
            }
        }

        debug!(container = %self.id, returned = documents.len(), "cosmos query");
        Ok(documents)
    }

    async fn upsert_item(&self, item: Value) -> Result<Value, StoreError> {
        self.write_document(item, true).await
    }

    async fn read_item(&self, id: &str, partition_key: &str) -> Result<Value, StoreError> {
        let link = self.document_link(id);
        let response = self
            .connection
            .request(Method::GET, "docs", &link, &link)
            .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            .send()
            .await?;
        let response = check(response).await?;
        Ok(strip_system_properties(response.json().await?))
    }

    async fn replace_item(
        &self,
        id: &str,
        partition_key: &str,
        item: Value,
    ) -> Result<Value, StoreError> {
        let mut item = item;
        if let Some(object) = item.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
        let link = self.document_link(id);
        let response = self
            .connection
            .request(Method::PUT, "docs", &link, &link)
            .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            .json(&item)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(strip_system_properties(response.json().await?))
    }

    async fn delete_item(&self, id: &str, partition_key: &str) -> Result<(), StoreError> {
        let link = self.document_link(id);
        let response = self
            .connection
            .request(Method::DELETE, "docs", &link, &link)
            .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::from_status(status.as_u16(), message))
}

/// RFC 1123 date as required by `x-ms-date`.
fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Master-key authorization header value.
fn authorization_token(
    key: &hmac::Key,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> String {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let signature = STANDARD.encode(hmac::sign(key, payload.as_bytes()).as_ref());
    urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned()
}

fn partition_header(value: &str) -> String {
    Value::Array(vec![Value::String(value.to_string())]).to_string()
}

fn partition_key_of(item: &Value) -> Result<String, StoreError> {
    item.get(PARTITION_KEY_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::MissingPartitionKey(PARTITION_KEY_FIELD.to_string()))
}

fn ensure_id(mut item: Value) -> Value {
    if let Some(object) = item.as_object_mut() {
        if !object.contains_key("id") {
            object.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
    }
    item
}

/// Drops `_rid`, `_self`, `_etag`, `_attachments` and `_ts`.
fn strip_system_properties(mut document: Value) -> Value {
    if let Some(object) = document.as_object_mut() {
        object.retain(|key, _| !key.starts_with('_'));
    }
    document
}
