//! Memory id resolution.
//!
//! Sources, in order: request payload, in-process cache, parameter store,
//! environment. The first value found wins; store and environment hits are
//! cached for later requests.

use edubridge_config::ParameterStore;
use edubridge_core::error::MemoryError;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const UNRESOLVED_MESSAGE: &str =
    "memory_id is required but not found in payload, cache, parameter store, or environment";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Non-empty, `[A-Za-z0-9_-]` only.
pub fn validate_memory_id(id: &str) -> Result<(), MemoryError> {
    if !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(MemoryError::InvalidMemoryId(id.to_string()))
    }
}

pub struct MemoryIdResolver {
    cache: RwLock<Option<String>>,
    store: Arc<dyn ParameterStore>,
    parameter_name: String,
    env_var: String,
    env: EnvLookup,
}

impl MemoryIdResolver {
    pub fn new(
        store: Arc<dyn ParameterStore>,
        parameter_name: impl Into<String>,
        env_var: impl Into<String>,
    ) -> Self {
        Self {
            cache: RwLock::new(None),
            store,
            parameter_name: parameter_name.into(),
            env_var: env_var.into(),
            env: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Pre-seed the cache (e.g. with a memory id pinned in config).
    pub fn with_cached(self, memory_id: Option<String>) -> Self {
        Self {
            cache: RwLock::new(memory_id),
            ..self
        }
    }

    /// Replace the environment lookup.
    pub fn with_env(self, env: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            env: Arc::new(env),
            ..self
        }
    }

    pub async fn resolve(&self, payload: Option<&str>) -> Result<String, MemoryError> {
        let id = self.lookup(payload).await?;
        validate_memory_id(&id)?;
        Ok(id)
    }

    async fn lookup(&self, payload: Option<&str>) -> Result<String, MemoryError> {
        if let Some(id) = payload.filter(|id| !id.is_empty()) {
            debug!(memory_id = id, "Using memory_id from payload");
            return Ok(id.to_string());
        }

        if let Some(id) = self.cache.read().await.clone() {
            debug!(memory_id = %id, "Using cached memory_id");
            return Ok(id);
        }

        match self.store.get(&self.parameter_name).await {
            Ok(Some(id)) if !id.is_empty() => {
                info!(memory_id = %id, parameter = %self.parameter_name, "Retrieved memory_id from parameter store");
                *self.cache.write().await = Some(id.clone());
                return Ok(id);
            }
            Ok(_) => debug!(parameter = %self.parameter_name, "memory_id not in parameter store"),
            Err(e) => warn!(error = %e, "Could not get memory_id from parameter store"),
        }

        if let Some(id) = (self.env)(&self.env_var).filter(|id| !id.is_empty()) {
            info!(memory_id = %id, var = %self.env_var, "Using memory_id from environment");
            *self.cache.write().await = Some(id.clone());
            return Ok(id);
        }

        Err(MemoryError::Unresolved(UNRESOLVED_MESSAGE.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edubridge_config::{ConfigError, StaticParameterStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PARAM: &str = "/edubridge/memory_id";

    struct CountingStore {
        value: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ParameterStore for CountingStore {
        async fn get(&self, _name: &str) -> Result<Option<String>, ConfigError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ParameterStore for BrokenStore {
        async fn get(&self, name: &str) -> Result<Option<String>, ConfigError> {
            Err(ConfigError::Parameter {
                name: name.into(),
                reason: "access denied".into(),
            })
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn memory_id_format() {
        assert!(validate_memory_id("EduMemory-abc_123").is_ok());
        assert!(validate_memory_id("").is_err());
        assert!(validate_memory_id("bad id").is_err());
        assert!(validate_memory_id("bad/id").is_err());
    }

    #[tokio::test]
    async fn payload_wins() {
        let store = Arc::new(StaticParameterStore::default().with(PARAM, "from-store"));
        let r = MemoryIdResolver::new(store, PARAM, "MEMORY_ID").with_env(no_env);
        assert_eq!(r.resolve(Some("from-payload")).await.unwrap(), "from-payload");
    }

    #[tokio::test]
    async fn store_hit_is_cached() {
        let store = Arc::new(CountingStore {
            value: Some("mem-store".into()),
            calls: AtomicUsize::new(0),
        });
        let r = MemoryIdResolver::new(store.clone(), PARAM, "MEMORY_ID").with_env(no_env);
        assert_eq!(r.resolve(None).await.unwrap(), "mem-store");
        assert_eq!(r.resolve(None).await.unwrap(), "mem-store");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn env_used_after_store_failure() {
        let r = MemoryIdResolver::new(Arc::new(BrokenStore), PARAM, "MEMORY_ID")
            .with_env(|k| (k == "MEMORY_ID").then(|| "mem-env".to_string()));
        assert_eq!(r.resolve(None).await.unwrap(), "mem-env");
    }

    #[tokio::test]
    async fn seeded_cache_skips_store() {
        let store = Arc::new(CountingStore {
            value: Some("mem-store".into()),
            calls: AtomicUsize::new(0),
        });
        let r = MemoryIdResolver::new(store.clone(), PARAM, "MEMORY_ID")
            .with_cached(Some("mem-config".into()))
            .with_env(no_env);
        assert_eq!(r.resolve(None).await.unwrap(), "mem-config");
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nothing_found_is_unresolved() {
        let r = MemoryIdResolver::new(Arc::new(StaticParameterStore::default()), PARAM, "MEMORY_ID")
            .with_env(no_env);
        let err = r.resolve(None).await.unwrap_err();
        assert!(err.to_string().contains(UNRESOLVED_MESSAGE));
    }

    #[tokio::test]
    async fn malformed_id_rejected() {
        let r = MemoryIdResolver::new(Arc::new(StaticParameterStore::default()), PARAM, "MEMORY_ID")
            .with_env(no_env);
        assert!(matches!(
            r.resolve(Some("not valid!")).await,
            Err(MemoryError::InvalidMemoryId(_))
        ));
    }
}
