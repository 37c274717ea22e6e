//! Process-wide construction of the orchestrator from configuration.
//!
//! Runs once at startup. Values that live in the parameter store (gateway
//! URL, OAuth client credentials, knowledge-base id) are looked up here and
//! baked into long-lived clients.

use crate::loop_runner::TurnRunner;
use crate::orchestrator::{OrchestrationError, Orchestrator};
use edubridge_config::{AppConfig, KnowledgeBaseConfig, OAuthConfig, ParameterStore, ToolGatewayConfig};
use edubridge_core::event::EventBus;
use edubridge_core::provider::Provider;
use edubridge_identity::{ClientCredentialsTokenSource, TokenSource};
use edubridge_memory::{MemoryBinding, MemoryIdResolver};
use edubridge_tools::{GatewayClient, HttpKnowledgeBase, KnowledgeSource, LocalTools, SubAgent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

async fn lookup(store: &dyn ParameterStore, configured: Option<&str>, name: &str) -> Option<String> {
    match store.get_or_configured(configured, name).await {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(e) => {
            warn!(parameter = name, error = %e, "Parameter lookup failed");
            None
        }
    }
}

/// Client-credentials token source, when id, secret and token URL are all known.
pub async fn token_source(oauth: &OAuthConfig, store: &dyn ParameterStore) -> Option<Arc<dyn TokenSource>> {
    let token_url = lookup(store, oauth.token_url.as_deref(), &oauth.token_url_parameter).await;
    let client_id = lookup(store, oauth.client_id.as_deref(), &oauth.client_id_parameter).await;
    let client_secret = lookup(store, oauth.client_secret.as_deref(), &oauth.client_secret_parameter).await;
    let scope = lookup(store, oauth.scope.as_deref(), &oauth.scope_parameter).await;

    let (Some(token_url), Some(client_id), Some(client_secret)) = (token_url, client_id, client_secret) else {
        info!("OAuth client credentials not configured; gateway requests are unauthenticated");
        return None;
    };
    match ClientCredentialsTokenSource::new(token_url, client_id, client_secret, scope) {
        Ok(source) => Some(Arc::new(source)),
        Err(e) => {
            warn!(error = %e, "Could not build OAuth token source");
            None
        }
    }
}

/// The remote tool gateway client, or `None` to run with local tools only.
pub async fn gateway_client(
    gateway: &ToolGatewayConfig,
    oauth: &OAuthConfig,
    store: &dyn ParameterStore,
) -> Option<Arc<GatewayClient>> {
    if !gateway.enabled {
        info!("Tool gateway disabled");
        return None;
    }
    let Some(url) = lookup(store, gateway.url.as_deref(), &gateway.url_parameter).await else {
        warn!(parameter = %gateway.url_parameter, "Gateway URL not found; using local tools only");
        return None;
    };
    let tokens = token_source(oauth, store).await;
    match GatewayClient::new(url.clone(), Duration::from_secs(gateway.timeout_secs), tokens) {
        Ok(client) => {
            info!(url = %url, "Tool gateway configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!(error = %e, "Could not build gateway client; using local tools only");
            None
        }
    }
}

pub async fn knowledge_source(kb: &KnowledgeBaseConfig, store: &dyn ParameterStore) -> Option<Arc<dyn KnowledgeSource>> {
    let endpoint = kb.endpoint.as_deref()?;
    let Some(id) = lookup(store, kb.knowledge_base_id.as_deref(), &kb.knowledge_base_id_parameter).await else {
        warn!("Knowledge base endpoint set but no knowledge base id found");
        return None;
    };
    match HttpKnowledgeBase::new(endpoint, id) {
        Ok(source) => Some(Arc::new(source)),
        Err(e) => {
            warn!(error = %e, "Could not build knowledge base client");
            None
        }
    }
}

/// Assemble the in-process orchestrator.
pub async fn orchestrator_from_config(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    store: Arc<dyn ParameterStore>,
    event_bus: Arc<EventBus>,
) -> Result<Orchestrator, OrchestrationError> {
    let backend = edubridge_memory::backend_from_config(&config.memory)
        .map_err(|e| OrchestrationError::Configuration(e.to_string()))?;
    let memory = MemoryBinding::new(backend, &config.memory);
    let memory_ids = MemoryIdResolver::new(
        store.clone(),
        config.memory.memory_id_parameter.clone(),
        config.memory.memory_id_env.clone(),
    )
    .with_cached(config.memory.memory_id.clone());

    let mut local_tools = LocalTools::new(SubAgent::from_config(provider.clone(), &config.model));
    if let Some(source) = knowledge_source(&config.knowledge_base, store.as_ref()).await {
        local_tools = local_tools.with_knowledge_base(source, config.knowledge_base.top_k);
    }

    let runner = TurnRunner::from_config(provider, &config.model, event_bus.clone());
    let mut orchestrator = Orchestrator::new(runner, memory_ids, memory, local_tools, event_bus);
    if let Some(gateway) = gateway_client(&config.gateway, &config.oauth, store.as_ref()).await {
        orchestrator = orchestrator.with_gateway(gateway);
    }
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edubridge_config::StaticParameterStore;

    fn store() -> StaticParameterStore {
        StaticParameterStore::default()
            .with("/edubridge/gateway_url", "http://gateway.local/mcp")
            .with("/edubridge/oauth/token_url", "http://auth.local/oauth2/token")
            .with("/edubridge/oauth/client_id", "client")
            .with("/edubridge/oauth/client_secret", "secret")
    }

    #[tokio::test]
    async fn gateway_url_from_parameter_store() {
        let client = gateway_client(&ToolGatewayConfig::default(), &OAuthConfig::default(), &store())
            .await
            .unwrap();
        assert_eq!(client.url(), "http://gateway.local/mcp");
    }

    #[tokio::test]
    async fn configured_url_wins() {
        let gateway = ToolGatewayConfig {
            url: Some("http://pinned/mcp".into()),
            ..Default::default()
        };
        let client = gateway_client(&gateway, &OAuthConfig::default(), &store()).await.unwrap();
        assert_eq!(client.url(), "http://pinned/mcp");
    }

    #[tokio::test]
    async fn missing_or_disabled_gateway_is_none() {
        let empty = StaticParameterStore::default();
        assert!(gateway_client(&ToolGatewayConfig::default(), &OAuthConfig::default(), &empty).await.is_none());

        let disabled = ToolGatewayConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(gateway_client(&disabled, &OAuthConfig::default(), &store()).await.is_none());
    }

    #[tokio::test]
    async fn token_source_needs_all_credentials() {
        assert!(token_source(&OAuthConfig::default(), &store()).await.is_some());
        let partial = StaticParameterStore::default().with("/edubridge/oauth/client_id", "client");
        assert!(token_source(&OAuthConfig::default(), &partial).await.is_none());
    }

    #[tokio::test]
    async fn knowledge_source_needs_endpoint_and_id() {
        let kb = KnowledgeBaseConfig::default();
        assert!(knowledge_source(&kb, &store()).await.is_none());

        let kb = KnowledgeBaseConfig {
            endpoint: Some("http://kb.local".into()),
            knowledge_base_id: Some("KB1".into()),
            ..Default::default()
        };
        assert!(knowledge_source(&kb, &store()).await.is_some());
    }

    #[tokio::test]
    async fn builds_from_default_config() {
        let mut config = AppConfig::default();
        config.memory.backend = "in_memory".into();
        config.gateway.enabled = false;
        let provider: Arc<dyn Provider> = Arc::new(crate::loop_runner::testing::ScriptedProvider::new(vec![]));
        let orchestrator = orchestrator_from_config(&config, provider, Arc::new(store()), Arc::new(EventBus::default()))
            .await
            .unwrap();
        assert!(!orchestrator.has_gateway());
    }

    #[tokio::test]
    async fn unknown_memory_backend_is_configuration_error() {
        let mut config = AppConfig::default();
        config.memory.backend = "carrier-pigeon".into();
        let provider: Arc<dyn Provider> = Arc::new(crate::loop_runner::testing::ScriptedProvider::new(vec![]));
        let result = orchestrator_from_config(&config, provider, Arc::new(store()), Arc::new(EventBus::default())).await;
        assert!(matches!(result, Err(OrchestrationError::Configuration(_))));
    }
}
