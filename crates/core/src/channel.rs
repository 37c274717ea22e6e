//! Channel trait: the abstraction over the messaging transport.
//!
//! A Channel delivers replies to users and acknowledges the messages they
//! sent. Inbound decoding is transport-specific and lives with each
//! implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// The kind of content a user sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Other(String),
}

impl MessageKind {
    pub fn from_type(raw: &str) -> Self {
        match raw {
            "text" => MessageKind::Text,
            "image" => MessageKind::Image,
            "audio" => MessageKind::Audio,
            "video" => MessageKind::Video,
            "document" => MessageKind::Document,
            other => MessageKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
            MessageKind::Video => "video",
            MessageKind::Document => "document",
            MessageKind::Other(raw) => raw,
        }
    }
}

/// A message received from a user, after envelope decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender phone number as delivered by the transport
    pub sender_phone: String,

    /// Transport message id (used for read receipts)
    pub message_id: String,

    /// Text to hand to the orchestrator; non-text messages get a placeholder
    pub body_text: String,

    pub message_type: MessageKind,

    /// Sender's profile name
    pub contact_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Outcome of a successful outbound delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Provider-assigned ids, one per transmitted part
    pub message_ids: Vec<String>,
}

impl DeliveryReceipt {
    /// The id of the first transmitted part.
    pub fn message_id(&self) -> &str {
        self.message_ids.first().map(String::as_str).unwrap_or_default()
    }
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "whatsapp").
    fn name(&self) -> &str;

    /// Send a plain-text message to a destination (E.164 phone number).
    async fn send(
        &self,
        to: &str,
        content: &str,
    ) -> std::result::Result<DeliveryReceipt, ChannelError>;

    /// Acknowledge an inbound message as read.
    async fn mark_read(&self, _message_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel configured and reachable?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
