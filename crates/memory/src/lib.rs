//! Conversational memory for EduBridge.
//!
//! - **resolver**: finds the memory id for a request
//! - **binding**: the three retrieval namespaces of one actor/session
//! - **http**: client for the managed memory service
//! - **in_memory**: keyword-scored backend for local runs and tests

pub mod binding;
pub mod http;
pub mod in_memory;
pub mod resolver;

pub use binding::{MemoryBinding, MemorySession};
pub use http::ManagedMemoryClient;
pub use in_memory::InMemoryBackend;
pub use resolver::{MemoryIdResolver, validate_memory_id};

use edubridge_config::MemoryConfig;
use edubridge_core::error::MemoryError;
use edubridge_core::memory::MemoryBackend;
use std::sync::Arc;

/// Build the backend selected by `memory.backend`.
pub fn backend_from_config(config: &MemoryConfig) -> Result<Arc<dyn MemoryBackend>, MemoryError> {
    match config.backend.as_str() {
        "in_memory" => Ok(Arc::new(InMemoryBackend::new(config.namespace_prefix.clone()))),
        "managed" => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                MemoryError::Storage("memory.endpoint is required for the managed backend".into())
            })?;
            Ok(Arc::new(ManagedMemoryClient::new(endpoint)?))
        }
        other => Err(MemoryError::Storage(format!("unknown memory backend '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_selection() {
        let mut config = MemoryConfig {
            backend: "in_memory".into(),
            ..MemoryConfig::default()
        };
        assert_eq!(backend_from_config(&config).unwrap().name(), "in_memory");

        config.backend = "managed".into();
        assert!(backend_from_config(&config).is_err());
        config.endpoint = Some("http://memory.local".into());
        assert_eq!(backend_from_config(&config).unwrap().name(), "managed");

        config.backend = "redis".into();
        assert!(backend_from_config(&config).is_err());
    }
}
