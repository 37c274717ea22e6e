//! Configuration loading, validation, and management for EduBridge.
//!
//! Loads configuration from `~/.edubridge/config.toml` (or the file named by
//! `EDUBRIDGE_CONFIG`) with environment variable overrides. Values that live
//! in the shared parameter store are resolved lazily through
//! [`params::ParameterStore`].

pub mod params;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use params::{CachedParameterStore, HttpParameterStore, ParameterStore, StaticParameterStore};

/// The root configuration structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Orchestrator model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Conversational memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Remote tool gateway
    #[serde(default)]
    pub gateway: ToolGatewayConfig,

    /// OAuth client credentials for the tool gateway
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// User directory used for persona lookup
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// WhatsApp messaging transport
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Knowledge base used by the `retrieve` tool
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// How the inbound pipeline reaches the orchestrator
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared parameter store
    #[serde(default)]
    pub parameters: ParameterStoreConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("memory", &self.memory)
            .field("gateway", &self.gateway)
            .field("oauth", &self.oauth)
            .field("directory", &self.directory)
            .field("whatsapp", &self.whatsapp)
            .field("knowledge_base", &self.knowledge_base)
            .field("runtime", &self.runtime)
            .field("server", &self.server)
            .field("parameters", &self.parameters)
            .finish()
    }
}

// --- Model ---

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on tool-call rounds within one turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Stream model output (drained before replying)
    #[serde(default)]
    pub stream: bool,

    /// Temperature for the domain sub-agents
    #[serde(default = "default_sub_agent_temperature")]
    pub sub_agent_temperature: f32,
}

fn default_provider_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model_id() -> String {
    "openai/gpt-oss-20b".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_max_tool_iterations() -> u32 {
    10
}
fn default_sub_agent_temperature() -> f32 {
    0.3
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            api_key: None,
            model_id: default_model_id(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_tool_iterations: default_max_tool_iterations(),
            stream: false,
            sub_agent_temperature: default_sub_agent_temperature(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider_url", &self.provider_url)
            .field("api_key", &redact(&self.api_key))
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_tool_iterations", &self.max_tool_iterations)
            .field("stream", &self.stream)
            .field("sub_agent_temperature", &self.sub_agent_temperature)
            .finish()
    }
}

// --- Memory ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "managed" (HTTP memory service) or "in_memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Managed memory service endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Memory id pinned in config; takes the place of the in-process cache seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,

    /// Parameter store key holding the memory id
    #[serde(default = "default_memory_id_parameter")]
    pub memory_id_parameter: String,

    /// Environment variable consulted last
    #[serde(default = "default_memory_id_env")]
    pub memory_id_env: String,

    /// Namespace prefix, e.g. `/edu` gives `/edu/{actorId}/facts`
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_relevance_score")]
    pub relevance_score: f32,

    /// Record each successful turn as a session event
    #[serde(default = "default_true")]
    pub record_turns: bool,
}

fn default_memory_backend() -> String {
    "managed".into()
}
fn default_memory_id_parameter() -> String {
    "/edubridge/memory_id".into()
}
fn default_memory_id_env() -> String {
    "MEMORY_ID".into()
}
fn default_namespace_prefix() -> String {
    "/edu".into()
}
fn default_top_k() -> usize {
    5
}
fn default_relevance_score() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            endpoint: None,
            memory_id: None,
            memory_id_parameter: default_memory_id_parameter(),
            memory_id_env: default_memory_id_env(),
            namespace_prefix: default_namespace_prefix(),
            top_k: default_top_k(),
            relevance_score: default_relevance_score(),
            record_turns: true,
        }
    }
}

// --- Tool gateway ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolGatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Gateway URL; looked up in the parameter store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_gateway_url_parameter")]
    pub url_parameter: String,

    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_gateway_url_parameter() -> String {
    "/edubridge/gateway_url".into()
}
fn default_gateway_timeout() -> u64 {
    30
}

impl Default for ToolGatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            url_parameter: default_gateway_url_parameter(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

// --- OAuth ---

#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default = "default_token_url_parameter")]
    pub token_url_parameter: String,

    #[serde(default = "default_client_id_parameter")]
    pub client_id_parameter: String,

    #[serde(default = "default_client_secret_parameter")]
    pub client_secret_parameter: String,

    #[serde(default = "default_scope_parameter")]
    pub scope_parameter: String,
}

fn default_token_url_parameter() -> String {
    "/edubridge/oauth/token_url".into()
}
fn default_client_id_parameter() -> String {
    "/edubridge/oauth/client_id".into()
}
fn default_client_secret_parameter() -> String {
    "/edubridge/oauth/client_secret".into()
}
fn default_scope_parameter() -> String {
    "/edubridge/oauth/scope".into()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: None,
            client_id: None,
            client_secret: None,
            scope: None,
            token_url_parameter: default_token_url_parameter(),
            client_id_parameter: default_client_id_parameter(),
            client_secret_parameter: default_client_secret_parameter(),
            scope_parameter: default_scope_parameter(),
        }
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("scope", &self.scope)
            .finish()
    }
}

// --- Directory ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// "static" (users below) or "http"
    #[serde(default = "default_directory_backend")]
    pub backend: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pool_id: Option<String>,

    #[serde(default = "default_user_pool_parameter")]
    pub user_pool_parameter: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<DirectoryUserConfig>,
}

fn default_directory_backend() -> String {
    "static".into()
}
fn default_user_pool_parameter() -> String {
    "/edubridge/user_pool_id".into()
}
fn default_page_size() -> u32 {
    60
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: default_directory_backend(),
            endpoint: None,
            user_pool_id: None,
            user_pool_parameter: default_user_pool_parameter(),
            page_size: default_page_size(),
            users: vec![],
        }
    }
}

/// A user listed directly in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUserConfig {
    pub phone_number: String,

    /// Raw persona attribute; absent means the directory default applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// --- WhatsApp ---

#[derive(Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_api_base")]
    pub api_base: String,

    #[serde(default = "default_whatsapp_api_version")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Token echoed back during webhook verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,

    /// Recently handled message ids kept for redelivery suppression (0 disables)
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com".into()
}
fn default_whatsapp_api_version() -> String {
    "v20.0".into()
}
fn default_dedup_capacity() -> usize {
    512
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: default_whatsapp_api_base(),
            api_version: default_whatsapp_api_version(),
            phone_number_id: None,
            access_token: None,
            verify_token: None,
            app_secret: None,
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &redact(&self.access_token))
            .field("verify_token", &redact(&self.verify_token))
            .field("app_secret", &redact(&self.app_secret))
            .field("dedup_capacity", &self.dedup_capacity)
            .finish()
    }
}

// --- Knowledge base ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,

    #[serde(default = "default_kb_parameter")]
    pub knowledge_base_id_parameter: String,

    #[serde(default = "default_kb_top_k")]
    pub top_k: usize,
}

fn default_kb_parameter() -> String {
    "/edubridge/knowledge_base_id".into()
}
fn default_kb_top_k() -> usize {
    5
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            knowledge_base_id: None,
            knowledge_base_id_parameter: default_kb_parameter(),
            top_k: default_kb_top_k(),
        }
    }
}

// --- Runtime ---

#[derive(Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// "local" runs the orchestrator in-process; "remote" posts to `url`
    #[serde(default = "default_runtime_mode")]
    pub mode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Bearer token presented to the remote runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_runtime_timeout")]
    pub timeout_secs: u64,
}

fn default_runtime_mode() -> String {
    "local".into()
}
fn default_runtime_timeout() -> u64 {
    300
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: default_runtime_mode(),
            url: None,
            token: None,
            timeout_secs: default_runtime_timeout(),
        }
    }
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("mode", &self.mode)
            .field("url", &self.url)
            .field("token", &redact(&self.token))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// --- Server ---

#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Tokens accepted on `/invocations` and `/mcp`. Both routes refuse
    /// every request while this is empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bearer_tokens: Vec<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("bearer_tokens", &format!("[{} REDACTED]", self.bearer_tokens.len()))
            .finish()
    }
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            bearer_tokens: Vec::new(),
        }
    }
}

// --- Parameter store ---

#[derive(Clone, Serialize, Deserialize)]
pub struct ParameterStoreConfig {
    /// "static" (values below) or "http"
    #[serde(default = "default_parameter_backend")]
    pub backend: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub values: HashMap<String, String>,
}

fn default_parameter_backend() -> String {
    "static".into()
}

impl Default for ParameterStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_parameter_backend(),
            endpoint: None,
            values: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("ParameterStoreConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("keys", &keys)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `EDUBRIDGE_CONFIG` or `~/.edubridge/config.toml`,
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("EDUBRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    ///
    /// - `EDUBRIDGE_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `EDUBRIDGE_MODEL`
    /// - `WHATSAPP_ACCESS_TOKEN`, `WHATSAPP_PHONE_NUMBER_ID`
    /// - `USER_POOL_ID`
    /// - `EDUBRIDGE_RUNTIME_URL` (switches the runtime to remote mode)
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("EDUBRIDGE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("EDUBRIDGE_MODEL") {
            self.model.model_id = model;
        }
        if let Some(token) = lookup("WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = Some(token);
        }
        if let Some(id) = lookup("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = Some(id);
        }
        if let Some(pool) = lookup("USER_POOL_ID") {
            self.directory.user_pool_id = Some(pool);
        }
        if let Some(url) = lookup("EDUBRIDGE_RUNTIME_URL") {
            self.runtime.mode = "remote".into();
            self.runtime.url = Some(url);
        }
        if let Some(token) = lookup("EDUBRIDGE_RUNTIME_TOKEN") {
            self.runtime.token = Some(token);
        }
        if let Some(token) = lookup("EDUBRIDGE_API_TOKEN").filter(|t| !t.is_empty()) {
            if !self.server.bearer_tokens.contains(&token) {
                self.server.bearer_tokens.push(token);
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".edubridge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.memory.relevance_score) {
            return Err(ConfigError::ValidationError(
                "memory.relevance_score must be between 0.0 and 1.0".into(),
            ));
        }
        if self.memory.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "memory.top_k must be at least 1".into(),
            ));
        }
        if self.model.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "model.max_tool_iterations must be at least 1".into(),
            ));
        }
        match self.runtime.mode.as_str() {
            "local" => {}
            "remote" if self.runtime.url.is_some() => {}
            "remote" => {
                return Err(ConfigError::ValidationError(
                    "runtime.url is required when runtime.mode = \"remote\"".into(),
                ));
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown runtime.mode '{other}' (expected \"local\" or \"remote\")"
                )));
            }
        }
        Ok(())
    }

    /// Build the parameter store described by `[parameters]`, wrapped in a cache.
    pub fn parameter_store(&self) -> Result<CachedParameterStore, ConfigError> {
        let inner: std::sync::Arc<dyn ParameterStore> = match self.parameters.backend.as_str() {
            "static" => std::sync::Arc::new(StaticParameterStore::new(self.parameters.values.clone())),
            "http" => {
                let endpoint = self.parameters.endpoint.clone().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "parameters.endpoint is required for the http backend".into(),
                    )
                })?;
                std::sync::Arc::new(HttpParameterStore::new(endpoint)?)
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown parameters.backend '{other}'"
                )));
            }
        };
        Ok(CachedParameterStore::new(inner))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Parameter store error for '{name}': {reason}")]
    Parameter { name: String, reason: String },
}

impl From<ConfigError> for edubridge_core::Error {
    fn from(e: ConfigError) -> Self {
        edubridge_core::Error::Config {
            message: e.to_string(),
        }
    }
}
