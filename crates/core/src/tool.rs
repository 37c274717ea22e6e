//! Tool trait and capability sets.
//!
//! A `Tool` is one named, schema-described function the model can call.
//! Tools are grouped into `CapabilitySet`s (a local registry, a remote
//! gateway catalog) and a turn sees the ordered union of its sets as a
//! single `ToolCatalog`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful plain-text result.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "answer_student_questions").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A set of invocable capabilities behind one backing implementation.
#[async_trait]
pub trait CapabilitySet: Send + Sync {
    /// Where these capabilities come from ("local", "gateway", ...).
    fn source(&self) -> &str;

    /// Definitions for every capability in this set.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Whether this set can handle the named capability.
    fn contains(&self, name: &str) -> bool {
        self.definitions().iter().any(|d| d.name == name)
    }

    /// Invoke a capability by name.
    async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError>;
}

/// A registry of in-process tools, kept in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilitySet for ToolRegistry {
    fn source(&self) -> &str {
        "local"
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        self.execute(call).await
    }
}

/// The ordered union of capability sets visible to one turn.
///
/// Earlier sets shadow later ones: a name defined by two sets resolves to
/// the first.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    sets: Vec<Arc<dyn CapabilitySet>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self { sets: Vec::new() }
    }

    /// Append a capability set at the lowest precedence.
    pub fn with(mut self, set: Arc<dyn CapabilitySet>) -> Self {
        self.sets.push(set);
        self
    }

    /// Source labels in precedence order.
    pub fn sources(&self) -> Vec<&str> {
        self.sets.iter().map(|s| s.source()).collect()
    }

    /// Deduplicated definitions in precedence order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for set in &self.sets {
            for def in set.definitions() {
                if seen.insert(def.name.clone()) {
                    out.push(def);
                }
            }
        }
        out
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions().into_iter().map(|d| d.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.iter().all(|s| s.definitions().is_empty())
    }

    /// Route a call to the first set that defines it.
    pub async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let set = self
            .sets
            .iter()
            .find(|s| s.contains(&call.name))
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        set.invoke(call).await
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("sources", &self.sources())
            .field("tools", &self.names())
            .finish()
    }
}
