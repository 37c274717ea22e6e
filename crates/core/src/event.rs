//! Domain event system: decoupled observation of the request pipeline.
//!
//! The orchestrator publishes every stage transition; the inbound pipeline
//! publishes receipt and delivery events. Subscribers (tests, metrics
//! exporters) filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// The orchestration states, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStage {
    Received,
    PersonaResolved,
    MemoryBound,
    ToolsAssembled,
    ModelInvoked,
    Responded,
    Failed,
}

impl OrchestrationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationStage::Received => "received",
            OrchestrationStage::PersonaResolved => "persona_resolved",
            OrchestrationStage::MemoryBound => "memory_bound",
            OrchestrationStage::ToolsAssembled => "tools_assembled",
            OrchestrationStage::ModelInvoked => "model_invoked",
            OrchestrationStage::Responded => "responded",
            OrchestrationStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestrationStage::Responded | OrchestrationStage::Failed)
    }
}

impl std::fmt::Display for OrchestrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An inbound message was decoded from the transport
    MessageReceived {
        channel: String,
        message_id: String,
        message_type: String,
        timestamp: DateTime<Utc>,
    },

    /// An orchestration request moved to a new stage
    StageEntered {
        session_id: String,
        stage: OrchestrationStage,
        timestamp: DateTime<Utc>,
    },

    /// The remote catalog was unusable and the turn fell back to local tools
    CatalogFallback {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a response
    ResponseGenerated {
        session_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A reply was handed to the transport
    ResponseDelivered {
        channel: String,
        message_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::StageEntered {
            session_id: "s".into(),
            stage: OrchestrationStage::MemoryBound,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::StageEntered { stage, .. } => {
                assert_eq!(*stage, OrchestrationStage::MemoryBound);
            }
            _ => panic!("Expected StageEntered event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn terminal_stages() {
        assert!(OrchestrationStage::Responded.is_terminal());
        assert!(OrchestrationStage::Failed.is_terminal());
        assert!(!OrchestrationStage::ModelInvoked.is_terminal());
        assert_eq!(OrchestrationStage::PersonaResolved.to_string(), "persona_resolved");
    }
}
