//! Client for the managed memory service.
//!
//! - `POST {endpoint}/memories/{memoryId}/retrieve`
//!   `{namespace, searchCriteria: {searchQuery, topK}}` →
//!   `{memoryRecordSummaries: [{memoryRecordId, content: {text}, score, namespaces}]}`
//! - `POST {endpoint}/memories/{memoryId}/events`
//!   `{actorId, sessionId, eventTimestamp, payload: [{conversational: {content: {text}, role}}]}` →
//!   `{event: {eventId}}`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edubridge_core::error::MemoryError;
use edubridge_core::memory::{ConversationTurn, MemoryBackend, MemoryRecord, RetrievalConfig};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub struct ManagedMemoryClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    memory_record_summaries: Vec<RecordSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSummary {
    #[serde(default)]
    memory_record_id: String,
    content: RecordContent,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RecordContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct CreateEventResponse {
    event: CreatedEvent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEvent {
    event_id: String,
}

impl ManagedMemoryClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, memory_id: &str, action: &str) -> String {
        format!("{}/memories/{memory_id}/{action}", self.endpoint)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<T, String> {
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {text}"));
        }
        response.json().await.map_err(|e| format!("malformed response: {e}"))
    }
}

#[async_trait]
impl MemoryBackend for ManagedMemoryClient {
    fn name(&self) -> &str {
        "managed"
    }

    async fn retrieve(
        &self,
        memory_id: &str,
        namespace: &str,
        query: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let body = json!({
            "namespace": namespace,
            "searchCriteria": { "searchQuery": query, "topK": config.top_k },
        });
        let response: RetrieveResponse = self
            .post(self.url(memory_id, "retrieve"), body)
            .await
            .map_err(MemoryError::QueryFailed)?;

        let mut records: Vec<MemoryRecord> = response
            .memory_record_summaries
            .into_iter()
            .filter(|s| s.score >= config.relevance_score)
            .map(|s| MemoryRecord {
                id: s.memory_record_id,
                namespace: namespace.to_string(),
                content: s.content.text,
                score: s.score,
                created_at: s.created_at.unwrap_or_else(Utc::now),
            })
            .collect();
        records.truncate(config.top_k);
        debug!(namespace, count = records.len(), "Managed memory retrieve");
        Ok(records)
    }

    async fn create_event(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        turns: &[ConversationTurn],
    ) -> Result<String, MemoryError> {
        let payload: Vec<serde_json::Value> = turns
            .iter()
            .map(|t| json!({ "conversational": { "content": { "text": t.text }, "role": t.role } }))
            .collect();
        let body = json!({
            "actorId": actor_id,
            "sessionId": session_id,
            "eventTimestamp": Utc::now().to_rfc3339(),
            "payload": payload,
        });
        let response: CreateEventResponse = self
            .post(self.url(memory_id, "events"), body)
            .await
            .map_err(MemoryError::Storage)?;
        Ok(response.event.event_id)
    }
}
