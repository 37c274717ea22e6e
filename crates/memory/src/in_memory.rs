//! In-memory backend for local runs and tests.
//!
//! Records are scored by keyword overlap with the query. Recorded events
//! land in the actor's session namespace.

use async_trait::async_trait;
use chrono::Utc;
use edubridge_core::error::MemoryError;
use edubridge_core::memory::{ConversationTurn, MemoryBackend, MemoryRecord, RetrievalConfig};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryBackend {
    prefix: String,
    // memory id -> records
    records: Arc<RwLock<HashMap<String, Vec<MemoryRecord>>>>,
}

impl InMemoryBackend {
    pub fn new(namespace_prefix: impl Into<String>) -> Self {
        Self {
            prefix: namespace_prefix.into().trim_end_matches('/').to_string(),
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record directly into a namespace.
    pub async fn insert(&self, memory_id: &str, namespace: &str, content: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.records
            .write()
            .await
            .entry(memory_id.to_string())
            .or_default()
            .push(MemoryRecord {
                id: id.clone(),
                namespace: namespace.to_string(),
                content: content.to_string(),
                score: 0.0,
                created_at: Utc::now(),
            });
        id
    }

    pub async fn count(&self, memory_id: &str) -> usize {
        self.records
            .read()
            .await
            .get(memory_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("/edu")
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_string)
        .collect()
}

/// `1 - 0.5^matches`: one shared keyword scores 0.5, two 0.75, three 0.875.
fn keyword_score(query: &HashSet<String>, content: &str) -> f32 {
    let matches = tokens(content).intersection(query).count();
    1.0 - 0.5f32.powi(matches as i32)
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn retrieve(
        &self,
        memory_id: &str,
        namespace: &str,
        query: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let query_tokens = tokens(query);
        let store = self.records.read().await;
        let Some(records) = store.get(memory_id) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<MemoryRecord> = records
            .iter()
            .filter(|r| r.namespace == namespace)
            .map(|r| MemoryRecord {
                score: keyword_score(&query_tokens, &r.content),
                ..r.clone()
            })
            .filter(|r| r.score >= config.relevance_score)
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(config.top_k);
        Ok(results)
    }

    async fn create_event(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        turns: &[ConversationTurn],
    ) -> Result<String, MemoryError> {
        let namespace = format!("{}/{actor_id}/{session_id}", self.prefix);
        for turn in turns {
            self.insert(memory_id, &namespace, &turn.text).await;
        }
        Ok(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "/edu/5511/facts";

    fn cfg(top_k: usize, relevance: f32) -> RetrievalConfig {
        RetrievalConfig {
            top_k,
            relevance_score: relevance,
        }
    }

    #[tokio::test]
    async fn retrieve_scores_and_filters() {
        let mem = InMemoryBackend::default();
        mem.insert("m", NS, "Student name is Ana Souza").await;
        mem.insert("m", NS, "Likes chemistry labs").await;

        let results = mem.retrieve("m", NS, "what is my name Ana", &cfg(5, 0.7)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("Ana"));
        assert!(results[0].score >= 0.7);
    }

    #[tokio::test]
    async fn namespace_and_memory_id_isolated() {
        let mem = InMemoryBackend::default();
        mem.insert("m", NS, "chemistry chemistry labs").await;
        mem.insert("other", NS, "chemistry labs").await;
        mem.insert("m", "/edu/5511/preferences", "chemistry labs").await;

        let results = mem.retrieve("m", NS, "chemistry labs", &cfg(5, 0.0)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(mem.retrieve("none", NS, "chemistry", &cfg(5, 0.0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn top_k_truncates() {
        let mem = InMemoryBackend::default();
        for i in 0..10 {
            mem.insert("m", NS, &format!("math homework number {i}")).await;
        }
        let results = mem.retrieve("m", NS, "math homework", &cfg(5, 0.7)).await.unwrap();
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn events_land_in_session_namespace() {
        let mem = InMemoryBackend::new("/edu/");
        let turns = vec![
            ConversationTurn { role: "USER".into(), text: "Quais são minhas tarefas?".into() },
            ConversationTurn { role: "ASSISTANT".into(), text: "Você tem duas tarefas.".into() },
        ];
        let event_id = mem.create_event("m", "5511", "sess-1", &turns).await.unwrap();
        assert!(!event_id.is_empty());
        assert_eq!(mem.count("m").await, 2);

        let found = mem
            .retrieve("m", "/edu/5511/sess-1", "minhas tarefas", &cfg(5, 0.7))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn score_curve() {
        let q = tokens("alpha beta gamma");
        assert_eq!(keyword_score(&q, "nothing here"), 0.0);
        assert_eq!(keyword_score(&q, "alpha"), 0.5);
        assert_eq!(keyword_score(&q, "alpha beta"), 0.75);
    }
}
