//! Remote tool catalog over streamable HTTP.
//!
//! Each request is a JSON-RPC POST carrying a bearer token. Responses come
//! back either as plain JSON or as a short `text/event-stream` whose `data:`
//! lines hold the JSON-RPC response.

use async_trait::async_trait;
use edubridge_core::error::ToolError;
use edubridge_core::provider::ToolDefinition;
use edubridge_core::tool::{CapabilitySet, ToolCall, ToolResult};
use edubridge_identity::TokenSource;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, ToolsCallResult, ToolsListResult};

const ACCEPT: &str = "application/json, text/event-stream";
const SESSION_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_HEADER: &str = "MCP-Protocol-Version";
const MAX_LIST_PAGES: usize = 20;

pub struct GatewayClient {
    url: String,
    http: reqwest::Client,
    tokens: Option<Arc<dyn TokenSource>>,
    next_id: AtomicU64,
    session_id: RwLock<Option<String>>,
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|base| base.trim() == "text/event-stream")
}

/// The first JSON-RPC response found in an event-stream body.
fn parse_event_stream(body: &str) -> Option<JsonRpcResponse> {
    let mut data = String::new();
    for line in body.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
            continue;
        }
        if line.is_empty() && !data.is_empty() {
            if let Ok(response) = serde_json::from_str(&data) {
                return Some(response);
            }
            data.clear();
        }
    }
    serde_json::from_str(&data).ok()
}

impl GatewayClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::CatalogUnavailable(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            tokens,
            next_id: AtomicU64::new(1),
            session_id: RwLock::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, body: &impl Serialize) -> Result<reqwest::Response, String> {
        let mut request = self
            .http
            .post(&self.url)
            .header("Accept", ACCEPT)
            .header(PROTOCOL_HEADER, PROTOCOL_VERSION)
            .json(body);

        if let Some(session) = self.session_id.read().await.clone() {
            request = request.header(SESSION_HEADER, session);
        }
        if let Some(tokens) = &self.tokens {
            let token = tokens.token().await.map_err(|e| e.to_string())?;
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.trim().is_empty())
        {
            *self.session_id.write().await = Some(session.to_string());
        }
        Ok(response)
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // The gateway no longer knows our session.
            self.session_id.write().await.take();
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("'{method}' returned HTTP {}: {text}", status.as_u16()));
        }

        let parsed: JsonRpcResponse = if is_event_stream(&response) {
            let body = response.text().await.map_err(|e| e.to_string())?;
            parse_event_stream(&body)
                .ok_or_else(|| format!("no JSON-RPC response in event stream for '{method}'"))?
        } else {
            response
                .json()
                .await
                .map_err(|e| format!("malformed response for '{method}': {e}"))?
        };

        if let Some(err) = parsed.error {
            return Err(format!("'{method}' failed ({}): {}", err.code, err.message));
        }
        parsed.result.ok_or_else(|| format!("'{method}' returned no result"))
    }

    /// Handshake: `initialize`, then the `initialized` notification.
    ///
    /// Always starts a fresh session; `initialize` is never sent with a
    /// previous `Mcp-Session-Id`.
    pub async fn initialize(&self) -> Result<(), ToolError> {
        self.session_id.write().await.take();
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "edubridge", "version": env!("CARGO_PKG_VERSION") }
                })),
            )
            .await
            .map_err(ToolError::CatalogUnavailable)?;
        debug!(server = ?result.get("serverInfo"), "Gateway initialized");

        if let Err(e) = self.post(&JsonRpcRequest::notification("notifications/initialized")).await {
            warn!(error = %e, "Failed to send initialized notification");
        }
        Ok(())
    }

    /// Every tool the gateway advertises, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        let mut definitions = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self
                .request("tools/list", params)
                .await
                .map_err(ToolError::CatalogUnavailable)?;
            let page: ToolsListResult = serde_json::from_value(result)
                .map_err(|e| ToolError::CatalogUnavailable(format!("malformed tools/list result: {e}")))?;
            definitions.extend(page.tools.into_iter().map(ToolDefinition::from));
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(definitions)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: name.to_string(),
            reason,
        };
        let result = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await
            .map_err(failed)?;
        let result: ToolsCallResult =
            serde_json::from_value(result).map_err(|e| failed(format!("malformed tools/call result: {e}")))?;

        Ok(ToolResult {
            call_id: String::new(),
            success: !result.is_error,
            output: result.text(),
            data: None,
        })
    }

    /// Handshake and list the catalog.
    pub async fn fetch_toolset(self: &Arc<Self>) -> Result<GatewayToolset, ToolError> {
        self.initialize().await?;
        let definitions = self.list_tools().await?;
        info!(url = %self.url, tools = definitions.len(), "Fetched remote tool catalog");
        Ok(GatewayToolset {
            client: Arc::clone(self),
            definitions,
        })
    }
}

/// A fetched remote catalog.
pub struct GatewayToolset {
    client: Arc<GatewayClient>,
    definitions: Vec<ToolDefinition>,
}

#[async_trait]
impl CapabilitySet for GatewayToolset {
    fn source(&self) -> &str {
        "gateway"
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let mut result = self.client.call_tool(&call.name, call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }
}
