//! Binding a session to its memory namespaces.
//!
//! Each actor has three retrieval namespaces: the current session
//! transcript, long-term preferences, and long-term facts.

use edubridge_config::MemoryConfig;
use edubridge_core::error::MemoryError;
use edubridge_core::memory::{ConversationTurn, MemoryBackend, MemoryRecord, RetrievalConfig};
use edubridge_core::session::SessionHandle;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::resolver::validate_memory_id;

pub const SESSION_NAMESPACE: &str = "{prefix}/{actorId}/{sessionId}";
pub const PREFERENCES_NAMESPACE: &str = "{prefix}/{actorId}/preferences";
pub const FACTS_NAMESPACE: &str = "{prefix}/{actorId}/facts";

fn render(template: &str, prefix: &str, actor_id: &str, session_id: &str) -> String {
    template
        .replace("{prefix}", prefix)
        .replace("{actorId}", actor_id)
        .replace("{sessionId}", session_id)
}

/// Process-wide memory settings; binds per-request sessions.
#[derive(Clone)]
pub struct MemoryBinding {
    backend: Arc<dyn MemoryBackend>,
    prefix: String,
    retrieval: RetrievalConfig,
    record_turns: bool,
}

impl MemoryBinding {
    pub fn new(backend: Arc<dyn MemoryBackend>, config: &MemoryConfig) -> Self {
        Self {
            backend,
            prefix: config.namespace_prefix.trim_end_matches('/').to_string(),
            retrieval: RetrievalConfig {
                top_k: config.top_k,
                relevance_score: config.relevance_score,
            },
            record_turns: config.record_turns,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Namespaces for an actor's session, in retrieval order.
    pub fn namespaces(&self, actor_id: &str, session_id: &str) -> Vec<String> {
        [SESSION_NAMESPACE, PREFERENCES_NAMESPACE, FACTS_NAMESPACE]
            .iter()
            .map(|t| render(t, &self.prefix, actor_id, session_id))
            .collect()
    }

    /// Bind a session handle. Fails on an invalid memory id or empty ids.
    pub fn bind(&self, handle: SessionHandle) -> Result<MemorySession, MemoryError> {
        validate_memory_id(&handle.memory_id)?;
        if handle.actor_id.is_empty() {
            return Err(MemoryError::Storage("actor_id is empty".into()));
        }
        if handle.session_id.is_empty() {
            return Err(MemoryError::Storage("session_id is empty".into()));
        }

        let namespaces = self
            .namespaces(&handle.actor_id, &handle.session_id)
            .into_iter()
            .map(|ns| (ns, self.retrieval))
            .collect();

        Ok(MemorySession {
            backend: self.backend.clone(),
            handle,
            namespaces,
            record_turns: self.record_turns,
        })
    }
}

/// Memory bound to one actor and session.
pub struct MemorySession {
    backend: Arc<dyn MemoryBackend>,
    handle: SessionHandle,
    namespaces: Vec<(String, RetrievalConfig)>,
    record_turns: bool,
}

impl MemorySession {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn namespaces(&self) -> &[(String, RetrievalConfig)] {
        &self.namespaces
    }

    /// Retrieve relevant records from every namespace.
    ///
    /// A namespace that fails is logged and contributes nothing.
    pub async fn recall(&self, query: &str) -> Vec<MemoryRecord> {
        let mut records = Vec::new();
        for (namespace, config) in &self.namespaces {
            match self
                .backend
                .retrieve(&self.handle.memory_id, namespace, query, config)
                .await
            {
                Ok(found) => {
                    debug!(namespace = %namespace, count = found.len(), "Memory retrieved");
                    records.extend(found);
                }
                Err(e) => warn!(namespace = %namespace, error = %e, "Memory retrieval failed"),
            }
        }
        records
    }

    /// Record a completed exchange. Failures are logged only.
    pub async fn record(&self, user_text: &str, assistant_text: &str) {
        if !self.record_turns {
            return;
        }
        let turns = [
            ConversationTurn {
                role: "USER".into(),
                text: user_text.to_string(),
            },
            ConversationTurn {
                role: "ASSISTANT".into(),
                text: assistant_text.to_string(),
            },
        ];
        match self
            .backend
            .create_event(
                &self.handle.memory_id,
                &self.handle.actor_id,
                &self.handle.session_id,
                &turns,
            )
            .await
        {
            Ok(event_id) => debug!(event_id = %event_id, "Turn recorded"),
            Err(e) => warn!(error = %e, "Failed to record turn in memory"),
        }
    }

    /// Render retrieved records as a context block for the system prompt.
    pub fn format_context(records: &[MemoryRecord]) -> Option<String> {
        if records.is_empty() {
            return None;
        }
        let mut out = String::from("Relevant memories from previous conversations:\n");
        for r in records {
            let kind = r.namespace.rsplit('/').next().unwrap_or_default();
            let label = match kind {
                "preferences" | "facts" => kind,
                _ => "session",
            };
            out.push_str(&format!("- [{label}] {}\n", r.content));
        }
        Some(out)
    }
}
