//! Document-API client over HTTP
//!
//! Talks to the `/_db/{database}/_api/...` REST routes. Requests are spread
//! round-robin over the configured coordinators.

use super::{BatchOutcome, CollectionHandle, DocumentStore, OverwriteMode};
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Database every server has; used for database management requests
pub const SYSTEM_DATABASE: &str = "_system";

/// Names starting with `_` belong to the server and are never created
#[must_use]
pub fn is_system_name(name: &str) -> bool {
    name.starts_with('_')
}

/// How to reach the document store.
///
/// The password is never serialized; it is read from config files but not
/// written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Coordinator base URLs, e.g. `http://localhost:8529`
    pub endpoints: Vec<String>,
    /// Basic-auth user
    pub username: String,
    /// Basic-auth password
    #[serde(
        default = "empty_secret",
        deserialize_with = "deserialize_secret",
        skip_serializing
    )]
    pub password: SecretString,
    /// Database holding the benchmark collection
    pub database: String,
    /// Upper bound on requests in flight at once, across all endpoints
    pub max_connections: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["http://localhost:8529".to_string()],
            username: "root".to_string(),
            password: empty_secret(),
            database: SYSTEM_DATABASE.to_string(),
            max_connections: 64,
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new().into())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(|s| SecretString::new(s.into()))
}

/// Sharding options for [`HttpDocumentStore::ensure_collection`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOptions {
    /// Number of shards, server default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_shards: Option<u32>,
    /// Replication factor, server default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u64,
}

/// HTTP client for a single database
#[derive(Debug)]
pub struct HttpDocumentStore {
    client: Client,
    endpoints: Vec<Url>,
    next_endpoint: AtomicUsize,
    in_flight: Semaphore,
    username: String,
    password: SecretString,
    database: String,
}

impl HttpDocumentStore {
    /// Build a client for the given connection settings.
    ///
    /// TLS certificates are not verified when the first endpoint uses
    /// `https`; benchmark clusters typically run with self-signed
    /// certificates. At most `max_connections` requests are in flight at
    /// once (at least one).
    pub fn connect(config: &ConnectionConfig) -> StoreResult<Self> {
        let endpoints = config
            .endpoints
            .iter()
            .map(|raw| parse_endpoint(raw))
            .collect::<StoreResult<Vec<_>>>()?;
        let Some(first) = endpoints.first() else {
            return Err(StoreError::InvalidEndpoint {
                endpoint: String::new(),
                reason: "no endpoints configured".to_string(),
            });
        };

        for (i, endpoint) in endpoints.iter().enumerate() {
            tracing::info!(index = i, %endpoint, "Using endpoint");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(first.scheme() == "https")
            .pool_max_idle_per_host(config.max_connections)
            .build()
            .map_err(|source| StoreError::Transport {
                url: first.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            endpoints,
            next_endpoint: AtomicUsize::new(0),
            in_flight: Semaphore::new(config.max_connections.max(1)),
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        })
    }

    /// Database this client writes to
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Create the configured database unless it exists.
    ///
    /// Returns `true` if it was created. System databases are only checked.
    pub async fn ensure_database(&self) -> StoreResult<bool> {
        let _permit = self.acquire().await?;
        if is_system_name(&self.database) {
            let url = self.url(&self.database, "_api/database/current");
            let response = self.send(self.client.get(&url), &url).await?;
            return match response.status() {
                StatusCode::NOT_FOUND => Err(StoreError::DatabaseNotFound(self.database.clone())),
                _ => check_status(response, &url).await.map(|_| false),
            };
        }

        let url = self.url(SYSTEM_DATABASE, "_api/database");
        let body = serde_json::json!({ "name": self.database });
        let response = self.send(self.client.post(&url).json(&body), &url).await?;
        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(database = %self.database, "Database already exists");
            return Ok(false);
        }
        check_status(response, &url).await?;
        tracing::info!(database = %self.database, "Created database");
        Ok(true)
    }

    /// Create a collection unless it exists, then return its handle
    pub async fn ensure_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> StoreResult<CollectionHandle> {
        let _permit = self.acquire().await?;
        let url = self.url(&self.database, "_api/collection");
        let mut body = serde_json::to_value(options).map_err(|e| StoreError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if let Value::Object(map) = &mut body {
            map.insert("name".to_string(), Value::String(name.to_string()));
        }

        let response = self.send(self.client.post(&url).json(&body), &url).await?;
        match response.status() {
            StatusCode::CONFLICT => {
                tracing::debug!(collection = name, "Collection already exists");
            }
            StatusCode::NOT_FOUND => {
                return Err(StoreError::DatabaseNotFound(self.database.clone()));
            }
            _ => {
                check_status(response, &url).await?;
                tracing::info!(collection = name, "Created collection");
            }
        }
        Ok(CollectionHandle::new(name))
    }

    fn url(&self, database: &str, path: &str) -> String {
        let index = self.next_endpoint.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        let base = self.endpoints[index].as_str().trim_end_matches('/');
        format!("{base}/_db/{database}/{path}")
    }

    /// Permit for one request; held until its response body has been read
    async fn acquire(&self) -> StoreResult<SemaphorePermit<'_>> {
        self.in_flight
            .acquire()
            .await
            .map_err(|_| StoreError::Rejected("connection limiter closed".to_string()))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> StoreResult<Response> {
        request
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
            .map_err(|source| StoreError::Transport {
                url: url.to_string(),
                source,
            })
    }
}

fn parse_endpoint(raw: &str) -> StoreResult<Url> {
    let url = Url::parse(raw).map_err(|e| StoreError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StoreError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

async fn check_status(response: Response, url: &str) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error_message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(body);
    Err(StoreError::Server {
        status: status.as_u16(),
        url: url.to_string(),
        message,
    })
}

impl DocumentStore for HttpDocumentStore {
    async fn open_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
        let _permit = self.acquire().await?;
        let url = self.url(&self.database, &format!("_api/collection/{name}"));
        let response = self.send(self.client.get(&url), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }
        check_status(response, &url).await?;
        Ok(CollectionHandle::new(name))
    }

    async fn count(&self, collection: &CollectionHandle) -> StoreResult<u64> {
        let _permit = self.acquire().await?;
        let url = self.url(
            &self.database,
            &format!("_api/collection/{}/count", collection.name()),
        );
        let response = self.send(self.client.get(&url), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.name().to_string()));
        }
        let body: CountBody = check_status(response, &url)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(body.count)
    }

    async fn submit_batch(
        &self,
        collection: &CollectionHandle,
        documents: &[Document],
        mode: OverwriteMode,
        deadline: Duration,
    ) -> StoreResult<BatchOutcome> {
        let _permit = self.acquire().await?;
        let url = self.url(
            &self.database,
            &format!("_api/document/{}", collection.name()),
        );
        let request = self
            .client
            .post(&url)
            .query(&[("overwriteMode", mode.as_str())])
            .timeout(deadline)
            .json(documents);

        let response = self.send(request, &url).await.map_err(|err| match err {
            StoreError::Transport { source, .. } if source.is_timeout() => {
                StoreError::DeadlineExceeded(deadline)
            }
            other => other,
        })?;
        let results: Vec<Value> = check_status(response, &url)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let document_errors = results
            .iter()
            .filter(|r| r.get("error").and_then(Value::as_bool) == Some(true))
            .count();
        if document_errors > 0 {
            tracing::debug!(
                collection = collection.name(),
                document_errors,
                "Batch contained rejected documents"
            );
        }
        Ok(BatchOutcome {
            submitted: documents.len(),
            document_errors,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn system_names_are_reserved() {
        assert!(is_system_name("_system"));
        assert!(!is_system_name("bench"));
        assert!(!is_system_name(""));
    }

    #[test]
    fn rejects_bad_endpoints() {
        let config = ConnectionConfig {
            endpoints: vec!["tcp://localhost:8529".to_string()],
            ..ConnectionConfig::default()
        };
        assert!(matches!(
            HttpDocumentStore::connect(&config),
            Err(StoreError::InvalidEndpoint { .. })
        ));

        let config = ConnectionConfig {
            endpoints: Vec::new(),
            ..ConnectionConfig::default()
        };
        assert!(HttpDocumentStore::connect(&config).is_err());
    }

    #[test]
    fn endpoints_rotate() {
        let config = ConnectionConfig {
            endpoints: vec![
                "http://a:8529".to_string(),
                "http://b:8529/".to_string(),
            ],
            ..ConnectionConfig::default()
        };
        let store = HttpDocumentStore::connect(&config).unwrap();
        assert_eq!(store.url("db", "x"), "http://a:8529/_db/db/x");
        assert_eq!(store.url("db", "x"), "http://b:8529/_db/db/x");
        assert_eq!(store.url("db", "x"), "http://a:8529/_db/db/x");
    }

    #[test]
    fn password_is_redacted_and_never_serialized() {
        let config: ConnectionConfig = serde_json::from_value(serde_json::json!({
            "endpoints": ["http://a:8529"],
            "username": "root",
            "password": "hunter2",
            "database": "_system",
            "max_connections": 4
        }))
        .unwrap();
        assert_eq!(config.password.expose_secret(), "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["max_connections"], 4);

        let store = HttpDocumentStore::connect(&config).unwrap();
        assert!(!format!("{store:?}").contains("hunter2"));
        assert_eq!(store.in_flight.available_permits(), 4);
    }

    #[test]
    fn zero_connection_limit_still_allows_one_request() {
        let config = ConnectionConfig {
            max_connections: 0,
            ..ConnectionConfig::default()
        };
        let store = HttpDocumentStore::connect(&config).unwrap();
        assert_eq!(store.in_flight.available_permits(), 1);
    }

    #[test]
    fn collection_options_use_camel_case() {
        let options = CollectionOptions {
            number_of_shards: Some(3),
            replication_factor: None,
        };
        assert_eq!(
            serde_json::to_value(options).unwrap(),
            serde_json::json!({"numberOfShards": 3})
        );
    }
}
