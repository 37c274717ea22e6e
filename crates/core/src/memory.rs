//! Memory trait: the abstraction over the managed conversational memory store.
//!
//! Memory is partitioned into namespaces. A turn retrieves from a fixed set
//! of namespaces for its actor and records the exchange as a session event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// A single retrieved memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,

    /// Namespace the record was retrieved from
    pub namespace: String,

    pub content: String,

    /// Relevance score assigned by the store
    #[serde(default)]
    pub score: f32,

    pub created_at: DateTime<Utc>,
}

/// Retrieval parameters for one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum records to return
    pub top_k: usize,

    /// Minimum relevance score (0.0–1.0)
    pub relevance_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            relevance_score: 0.7,
        }
    }
}

/// One conversational turn to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub text: String,
}

/// The core MemoryBackend trait.
///
/// Implementations: managed HTTP store, in-memory (local runs and tests).
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The backend name (e.g., "managed", "in_memory").
    fn name(&self) -> &str;

    /// Retrieve records from one namespace.
    async fn retrieve(
        &self,
        memory_id: &str,
        namespace: &str,
        query: &str,
        config: &RetrievalConfig,
    ) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    /// Record conversational turns for an actor's session. Returns an event id.
    async fn create_event(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        turns: &[ConversationTurn],
    ) -> std::result::Result<String, MemoryError>;
}
