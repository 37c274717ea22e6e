//! JSON-RPC 2.0 framing for the tool gateway protocol.
//!
//! Three methods matter: `initialize`, `tools/list`, `tools/call`. The
//! client side lives in [`crate::remote`]; [`dispatch`] is the server side
//! over a local [`ToolRegistry`].

use edubridge_core::provider::ToolDefinition;
use edubridge_core::tool::{ToolCall, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent on notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(Value::from(id)),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: &str) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A tool as listed by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteToolDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl From<RemoteToolDef> for ToolDefinition {
    fn from(def: RemoteToolDef) -> Self {
        ToolDefinition {
            name: def.name,
            description: def.description.unwrap_or_default(),
            parameters: def.input_schema,
        }
    }
}

impl From<ToolDefinition> for RemoteToolDef {
    fn from(def: ToolDefinition) -> Self {
        RemoteToolDef {
            name: def.name,
            description: Some(def.description),
            input_schema: def.parameters,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsListResult {
    pub tools: Vec<RemoteToolDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    #[serde(rename = "resource")]
    Resource { resource: Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCallResult {
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolsCallResult {
    /// Text items joined by newlines; other content kinds are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn single(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent::Text { text }],
            is_error,
        }
    }
}

/// Answer one request against a local registry.
///
/// Returns `None` for notifications, which get no response.
pub async fn dispatch(registry: &ToolRegistry, server_name: &str, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let id = request.id?;
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": { "name": server_name, "version": env!("CARGO_PKG_VERSION") }
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => {
            let tools: Vec<RemoteToolDef> = registry
                .names()
                .into_iter()
                .filter_map(|name| registry.get(name))
                .map(|tool| tool.to_definition().into())
                .collect();
            match serde_json::to_value(ToolsListResult { tools, next_cursor: None }) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => JsonRpcResponse::failure(id, PARSE_ERROR, e.to_string()),
            }
        }
        "tools/call" => {
            let params: ToolsCallParams = match request.params.map(serde_json::from_value) {
                Some(Ok(params)) => params,
                Some(Err(e)) => return Some(JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string())),
                None => return Some(JsonRpcResponse::failure(id, INVALID_PARAMS, "missing params")),
            };
            if registry.get(&params.name).is_none() {
                return Some(JsonRpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    format!("Unknown tool: {}", params.name),
                ));
            }
            let call = ToolCall {
                id: id.to_string(),
                name: params.name,
                arguments: params.arguments,
            };
            let result = match registry.execute(&call).await {
                Ok(r) => ToolsCallResult::single(r.output, !r.success),
                Err(e) => ToolsCallResult::single(e.to_string(), true),
            };
            match serde_json::to_value(result) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => JsonRpcResponse::failure(id, PARSE_ERROR, e.to_string()),
            }
        }
        other => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
    };
    Some(response)
}
