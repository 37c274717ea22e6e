//! The inbound pipeline: decoded WhatsApp message → orchestration → reply.

use crate::dedup::RecentIds;
use chrono::Utc;
use edubridge_agent::{Orchestration, OrchestrationError, OrchestrationRequest};
use edubridge_channels::{EventBatch, WebhookPayload};
use edubridge_core::channel::{Channel, InboundMessage};
use edubridge_core::error::ChannelError;
use edubridge_core::event::{DomainEvent, EventBus};
use edubridge_core::session::{derive_session_id, normalize_phone};
use edubridge_identity::PersonaResolver;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Session(#[from] edubridge_core::Error),
}

/// Result of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub success: bool,
    /// Messages answered; skipped and duplicate messages are not counted
    pub processed: usize,
}

pub struct InboundPipeline {
    channel: Arc<dyn Channel>,
    personas: PersonaResolver,
    orchestration: Arc<dyn Orchestration>,
    recent: RecentIds,
    event_bus: Arc<EventBus>,
}

impl InboundPipeline {
    pub fn new(
        channel: Arc<dyn Channel>,
        personas: PersonaResolver,
        orchestration: Arc<dyn Orchestration>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            channel,
            personas,
            orchestration,
            recent: RecentIds::new(512),
            event_bus,
        }
    }

    /// Set the redelivery guard capacity (0 disables it).
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.recent = RecentIds::new(capacity);
        self
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Process notification records in order. The first failure stops the batch.
    pub async fn process_batch(&self, batch: &EventBatch) -> Result<BatchOutcome, PipelineError> {
        info!(records = batch.records.len(), "Processing event batch");
        let mut processed = 0;
        for record in &batch.records {
            let Some(message) = record.decode()? else {
                continue;
            };
            if self.handle(message).await? {
                processed += 1;
            }
        }
        Ok(BatchOutcome {
            success: true,
            processed,
        })
    }

    /// Process a direct webhook delivery.
    pub async fn process_webhook(&self, payload: &WebhookPayload) -> Result<BatchOutcome, PipelineError> {
        let mut processed = 0;
        for message in payload.messages() {
            if self.handle(message).await? {
                processed += 1;
            }
        }
        Ok(BatchOutcome {
            success: true,
            processed,
        })
    }

    /// Answer one message. Returns `false` when it was skipped as a redelivery.
    pub async fn handle(&self, message: InboundMessage) -> Result<bool, PipelineError> {
        let Some(claim) = self.recent.claim(&message.message_id) else {
            info!(message_id = %message.message_id, "Duplicate delivery, skipping");
            return Ok(false);
        };

        self.event_bus.publish(DomainEvent::MessageReceived {
            channel: self.channel.name().to_string(),
            message_id: message.message_id.clone(),
            message_type: message.message_type.as_str().to_string(),
            timestamp: Utc::now(),
        });
        info!(
            from = %message.contact_name,
            message_type = message.message_type.as_str(),
            "Inbound message"
        );

        if let Err(e) = self.channel.mark_read(&message.message_id).await {
            warn!(message_id = %message.message_id, error = %e, "Failed to mark message as read");
        }

        let persona = self.personas.resolve(&message.sender_phone).await;
        let session_id = derive_session_id(&message.sender_phone, Utc::now())?;
        let actor = normalize_phone(&message.sender_phone);

        let request = OrchestrationRequest {
            input_text: Some(message.body_text.clone()),
            persona: Some(persona.persona.as_str().to_string()),
            user_id: Some(actor.clone()),
            persona_id: Some(actor),
            whatsapp_phone_number: Some(message.sender_phone.clone()),
            ..Default::default()
        };

        let response = self.orchestration.invoke(request, Some(&session_id)).await?;

        if response.result.trim().is_empty() {
            warn!(session_id = %session_id, "Orchestrator returned an empty reply; nothing sent");
        } else {
            let receipt = self.channel.send(&message.sender_phone, &response.result).await?;
            info!(message_id = receipt.message_id(), "Reply delivered");
            self.event_bus.publish(DomainEvent::ResponseDelivered {
                channel: self.channel.name().to_string(),
                message_id: receipt.message_id().to_string(),
                timestamp: Utc::now(),
            });
        }

        claim.complete();
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use edubridge_agent::OrchestrationResponse;
    use edubridge_core::channel::DeliveryReceipt;
    use edubridge_core::persona::Persona;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingChannel {
        pub sent: Mutex<Vec<(String, String)>>,
        pub read: Mutex<Vec<String>>,
        pub fail_send: bool,
        pub fail_read: bool,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "whatsapp"
        }

        async fn send(&self, to: &str, content: &str) -> Result<DeliveryReceipt, ChannelError> {
            if self.fail_send {
                return Err(ChannelError::DeliveryFailed {
                    channel: "whatsapp".into(),
                    code: "131047".into(),
                    reason: "Re-engagement message".into(),
                });
            }
            self.sent.lock().unwrap().push((to.into(), content.into()));
            Ok(DeliveryReceipt {
                message_ids: vec!["wamid.out".into()],
            })
        }

        async fn mark_read(&self, message_id: &str) -> Result<(), ChannelError> {
            if self.fail_read {
                return Err(ChannelError::ConnectionLost("read receipt".into()));
            }
            self.read.lock().unwrap().push(message_id.into());
            Ok(())
        }
    }

    /// Echoes the request back as the reply and keeps every request.
    #[derive(Default)]
    pub struct EchoOrchestration {
        pub requests: Mutex<Vec<(OrchestrationRequest, String)>>,
        pub fail: bool,
        pub reply: Option<&'static str>,
        /// Held before replying, to overlap concurrent deliveries
        pub delay: Option<std::time::Duration>,
    }

    #[async_trait]
    impl Orchestration for EchoOrchestration {
        async fn invoke(
            &self,
            request: OrchestrationRequest,
            session_id: Option<&str>,
        ) -> Result<OrchestrationResponse, OrchestrationError> {
            let session_id = session_id.unwrap_or_default().to_string();
            self.requests.lock().unwrap().push((request.clone(), session_id.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(OrchestrationError::Configuration("model unavailable".into()));
            }
            let persona = request
                .persona
                .as_deref()
                .and_then(Persona::parse)
                .unwrap_or_default();
            Ok(OrchestrationResponse {
                result: self
                    .reply
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("echo: {}", request.query().unwrap_or_default())),
                session_id,
                persona,
            })
        }
    }
}
