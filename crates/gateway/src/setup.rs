//! Startup wiring: configuration in, [`GatewayState`] out.

use crate::GatewayState;
use crate::pipeline::InboundPipeline;
use crate::runtime_client::RuntimeClient;
use edubridge_agent::{Orchestration, OrchestrationError, orchestrator_from_config};
use edubridge_channels::WhatsAppChannel;
use edubridge_config::{AppConfig, ConfigError, DirectoryConfig, ParameterStore};
use edubridge_core::channel::Channel;
use edubridge_core::error::{ChannelError, DirectoryError, ProviderError};
use edubridge_core::event::EventBus;
use edubridge_core::tool::ToolRegistry;
use edubridge_identity::{HttpDirectory, PersonaResolver, StaticDirectory, UserDirectory};
use edubridge_tools::SendMessageTool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error("{0}")]
    Setup(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// The user directory described by `[directory]`.
pub async fn directory_from_config(
    config: &DirectoryConfig,
    store: &dyn ParameterStore,
) -> Result<Arc<dyn UserDirectory>, GatewayError> {
    match config.backend.as_str() {
        "static" => {
            info!(users = config.users.len(), "Using static user directory");
            Ok(Arc::new(StaticDirectory::from_config(&config.users)))
        }
        "http" => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| GatewayError::Setup("directory.endpoint is required for the http backend".into()))?;
            let pool = store
                .get_or_configured(config.user_pool_id.as_deref(), &config.user_pool_parameter)
                .await?
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    GatewayError::Setup(format!(
                        "user pool id not configured (directory.user_pool_id or {})",
                        config.user_pool_parameter
                    ))
                })?;
            info!(endpoint, "Using HTTP user directory");
            Ok(Arc::new(HttpDirectory::new(endpoint, pool, config.page_size)?))
        }
        other => Err(GatewayError::Setup(format!("unknown directory.backend '{other}'"))),
    }
}

/// In-process orchestrator for `runtime.mode = "local"`, HTTP client for "remote".
pub async fn orchestration_from_config(
    config: &AppConfig,
    store: Arc<dyn ParameterStore>,
    event_bus: Arc<EventBus>,
) -> Result<Arc<dyn Orchestration>, GatewayError> {
    match config.runtime.mode.as_str() {
        "remote" => {
            let url = config
                .runtime
                .url
                .clone()
                .ok_or_else(|| GatewayError::Setup("runtime.url is required in remote mode".into()))?;
            info!(url = %url, "Orchestration runs remotely");
            let client = RuntimeClient::new(url, Duration::from_secs(config.runtime.timeout_secs))?
                .with_bearer_token(config.runtime.token.clone());
            Ok(Arc::new(client))
        }
        _ => {
            let provider = edubridge_providers::build_provider(&config.model)?;
            let orchestrator = orchestrator_from_config(config, provider, store, event_bus).await?;
            info!(gateway = orchestrator.has_gateway(), "Orchestration runs in-process");
            Ok(Arc::new(orchestrator))
        }
    }
}

/// Everything the HTTP surface needs, built once.
pub async fn state_from_config(config: &AppConfig) -> Result<GatewayState, GatewayError> {
    let store: Arc<dyn ParameterStore> = Arc::new(config.parameter_store()?);
    let event_bus = Arc::new(EventBus::default());

    let channel: Arc<dyn Channel> = Arc::new(WhatsAppChannel::from_config(&config.whatsapp)?);
    let directory = directory_from_config(&config.directory, store.as_ref()).await?;
    let orchestration = orchestration_from_config(config, store, event_bus.clone()).await?;

    let pipeline = InboundPipeline::new(
        channel.clone(),
        PersonaResolver::new(directory),
        orchestration.clone(),
        event_bus,
    )
    .with_dedup_capacity(config.whatsapp.dedup_capacity);

    Ok(GatewayState {
        orchestration,
        pipeline,
        outbound_tools: outbound_tools(channel),
        verify_token: config.whatsapp.verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
        bearer_tokens: config.server.bearer_tokens.clone(),
    })
}

/// Tools served at `/mcp` for the remote gateway's consumers.
pub fn outbound_tools(channel: Arc<dyn Channel>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SendMessageTool::new(channel)));
    registry
}
