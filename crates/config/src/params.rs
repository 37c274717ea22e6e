//! Shared parameter store: named string values that live outside the
//! config file (gateway URL, OAuth client credentials, memory id).

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::ConfigError;

/// A source of named parameters.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch a parameter. `Ok(None)` means the store has no such name.
    async fn get(&self, name: &str) -> Result<Option<String>, ConfigError>;

    /// Fetch a parameter that must exist.
    async fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name).await?.ok_or_else(|| ConfigError::Parameter {
            name: name.to_string(),
            reason: "not found".into(),
        })
    }

    /// Prefer an explicitly configured value, falling back to the store.
    async fn get_or_configured(
        &self,
        configured: Option<&str>,
        name: &str,
    ) -> Result<Option<String>, ConfigError> {
        match configured {
            Some(value) => Ok(Some(value.to_string())),
            None => self.get(name).await,
        }
    }
}

/// Parameters held in memory, typically from the `[parameters.values]` table.
#[derive(Debug, Default, Clone)]
pub struct StaticParameterStore {
    values: HashMap<String, String>,
}

impl StaticParameterStore {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl ParameterStore for StaticParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.values.get(name).cloned())
    }
}

/// Parameters served over HTTP.
///
/// `GET {endpoint}?name={name}&with_decryption=true` returning
/// `{"Parameter": {"Name": "...", "Value": "..."}}`; 404 means absent.
pub struct HttpParameterStore {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct GetParameterResponse {
    #[serde(rename = "Parameter")]
    parameter: ParameterValue,
}

#[derive(Deserialize)]
struct ParameterValue {
    #[serde(rename = "Value")]
    value: String,
}

impl HttpParameterStore {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Parameter {
                name: "*".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl ParameterStore for HttpParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let err = |reason: String| ConfigError::Parameter {
            name: name.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("with_decryption", "true")])
            .send()
            .await
            .map_err(|e| err(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(err(format!("HTTP {}", status.as_u16())));
        }

        let body: GetParameterResponse = response
            .json()
            .await
            .map_err(|e| err(format!("malformed response: {e}")))?;
        Ok(Some(body.parameter.value))
    }
}

/// Caches hits from an inner store for the life of the process.
///
/// Misses and errors are not cached.
#[derive(Clone)]
pub struct CachedParameterStore {
    inner: Arc<dyn ParameterStore>,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl CachedParameterStore {
    pub fn new(inner: Arc<dyn ParameterStore>) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ParameterStore for CachedParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>, ConfigError> {
        if let Some(value) = self.cache.read().await.get(name) {
            return Ok(Some(value.clone()));
        }
        let fetched = self.inner.get(name).await?;
        if let Some(ref value) = fetched {
            tracing::debug!(parameter = name, "Cached parameter");
            self.cache.write().await.insert(name.to_string(), value.clone());
        }
        Ok(fetched)
    }
}
