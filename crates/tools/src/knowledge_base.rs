//! Knowledge base retrieval: the `retrieve` tool and its sources.
//!
//! The HTTP source speaks the knowledge-base retrieve API:
//! `POST {endpoint}/knowledgebases/{id}/retrieve`
//! `{retrievalQuery: {text}, retrievalConfiguration: {vectorSearchConfiguration: {numberOfResults}}}`
//! → `{retrievalResults: [{content: {text}, score, location, metadata}]}`.

use async_trait::async_trait;
use edubridge_core::error::ToolError;
use edubridge_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "retrieve";
const DEFAULT_MIN_SCORE: f64 = 0.4;

/// One scored passage from the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, ToolError>;
}

fn failed(reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: NAME.into(),
        reason: reason.into(),
    }
}

pub struct HttpKnowledgeBase {
    endpoint: String,
    knowledge_base_id: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Deserialize)]
struct RetrievalResult {
    content: ResultContent,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    location: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ResultContent {
    #[serde(default)]
    text: String,
}

/// First string `uri`/`url` found anywhere inside a location object.
fn location_uri(location: &serde_json::Value) -> Option<String> {
    match location {
        serde_json::Value::Object(map) => map
            .get("uri")
            .or_else(|| map.get("url"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| map.values().find_map(location_uri)),
        _ => None,
    }
}

impl HttpKnowledgeBase {
    pub fn new(endpoint: impl Into<String>, knowledge_base_id: impl Into<String>) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .map_err(|e| failed(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            knowledge_base_id: knowledge_base_id.into(),
            client,
        })
    }
}

#[async_trait]
impl KnowledgeSource for HttpKnowledgeBase {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, ToolError> {
        let url = format!("{}/knowledgebases/{}/retrieve", self.endpoint, self.knowledge_base_id);
        let body = json!({
            "retrievalQuery": { "text": query },
            "retrievalConfiguration": {
                "vectorSearchConfiguration": { "numberOfResults": top_k }
            }
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {status}: {text}")));
        }
        let parsed: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("malformed retrieve response: {e}")))?;

        Ok(parsed
            .retrieval_results
            .into_iter()
            .map(|r| Passage {
                content: r.content.text,
                score: r.score,
                source: r.location.as_ref().and_then(location_uri),
            })
            .collect())
    }
}

/// Fixed passages scored by keyword overlap. For local runs and tests.
#[derive(Default)]
pub struct StaticKnowledgeBase {
    passages: Vec<(String, String)>,
}

impl StaticKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Into<String>, content: impl Into<String>) -> Self {
        self.passages.push((source.into(), content.into()));
        self
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl KnowledgeSource for StaticKnowledgeBase {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, ToolError> {
        let query = keywords(query);
        let mut scored: Vec<Passage> = self
            .passages
            .iter()
            .filter_map(|(source, content)| {
                let hits = keywords(content).intersection(&query).count();
                (hits > 0).then(|| Passage {
                    content: content.clone(),
                    score: 1.0 - 0.5f64.powi(hits as i32),
                    source: Some(source.clone()),
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Retrieves subject content from the configured knowledge base.
pub struct RetrieveTool {
    source: Option<Arc<dyn KnowledgeSource>>,
    default_top_k: usize,
}

impl RetrieveTool {
    pub fn new(source: Option<Arc<dyn KnowledgeSource>>, default_top_k: usize) -> Self {
        Self {
            source,
            default_top_k: default_top_k.max(1),
        }
    }
}

fn format_passages(passages: &[Passage], min_score: f64) -> String {
    if passages.is_empty() {
        return format!("No results found with score >= {min_score:.1}.");
    }
    let mut out = format!("Retrieved {} results with score >= {min_score:.1}:\n", passages.len());
    for p in passages {
        out.push_str(&format!("\nScore: {:.4}\n", p.score));
        if let Some(source) = &p.source {
            out.push_str(&format!("Source: {source}\n"));
        }
        out.push_str(&format!("Content: {}\n", p.content));
    }
    out
}

#[async_trait]
impl Tool for RetrieveTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Retrieves subject content from the school's knowledge base. Use it when a student asks for study material or content for an upcoming test. Returns passages sorted by relevance."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The query to retrieve relevant knowledge"
                },
                "numberOfResults": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "default": self.default_top_k
                },
                "score": {
                    "type": "number",
                    "description": "Minimum relevance score (0.0-1.0)",
                    "default": DEFAULT_MIN_SCORE
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["text"]
            .as_str()
            .or_else(|| arguments["query"].as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
        let top_k = arguments["numberOfResults"]
            .as_u64()
            .map_or(self.default_top_k, |n| n.clamp(1, 20) as usize);
        let min_score = arguments["score"].as_f64().unwrap_or(DEFAULT_MIN_SCORE);

        let source = self
            .source
            .as_ref()
            .ok_or_else(|| failed("knowledge base is not configured"))?;

        let passages: Vec<Passage> = source
            .retrieve(query, top_k)
            .await?
            .into_iter()
            .filter(|p| p.score >= min_score)
            .collect();
        debug!(count = passages.len(), top_k, "Knowledge base retrieve");

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: format_passages(&passages, min_score),
            data: serde_json::to_value(&passages).ok(),
        })
    }
}
