//! LLM Provider implementations for EduBridge.
//!
//! All providers implement the `edubridge_core::Provider` trait. The
//! orchestrator and the domain sub-agents share one provider instance.

pub mod openai_compat;

use edubridge_config::ModelConfig;
use edubridge_core::Provider;
use edubridge_core::error::ProviderError;
use std::sync::Arc;

pub use openai_compat::OpenAiCompatProvider;

/// Build the provider described by `[model]`.
pub fn build_provider(config: &ModelConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    if config.provider_url.trim().is_empty() {
        return Err(ProviderError::NotConfigured(
            "model.provider_url is empty".into(),
        ));
    }
    let provider = OpenAiCompatProvider::new(
        "openai_compat",
        config.provider_url.clone(),
        config.api_key.clone(),
        std::time::Duration::from_secs(120),
    )?;
    tracing::debug!(url = %config.provider_url, model = %config.model_id, "Provider configured");
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        let provider = build_provider(&ModelConfig::default()).unwrap();
        assert_eq!(provider.name(), "openai_compat");
    }

    #[test]
    fn empty_url_rejected() {
        let config = ModelConfig {
            provider_url: " ".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(
            build_provider(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
