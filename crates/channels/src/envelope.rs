//! Inbound envelope decoding.
//!
//! Two shapes reach the gateway:
//!
//! - a notification batch `{Records: [{Sns: {Message: "<json>"}}]}` whose
//!   inner JSON carries `whatsAppWebhookEntry`, itself a JSON string of one
//!   webhook entry
//! - the direct WhatsApp Cloud webhook `{object, entry: [...]}`
//!
//! Both reduce to [`WebhookEntry`], and each entry yields at most one
//! [`InboundMessage`]: the first message of the first change.

use edubridge_core::channel::{InboundMessage, MessageKind};
use edubridge_core::error::ChannelError;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_CONTACT_NAME: &str = "Usuário";

/// A batch of notification records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "Sns")]
    pub notification: Notification,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
    #[serde(rename = "whatsAppWebhookEntry", default)]
    whatsapp_webhook_entry: Option<String>,
}

/// The direct webhook payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Option<Vec<RawMessage>>,
    #[serde(default)]
    pub contacts: Option<Vec<Contact>>,
    #[serde(default)]
    pub statuses: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_message_type() -> String {
    "text".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

/// Text handed to the orchestrator for a message of the given kind.
pub fn body_text(kind: &MessageKind, text: Option<&TextBody>) -> String {
    match kind {
        MessageKind::Text => text.map(|t| t.body.clone()).unwrap_or_default(),
        MessageKind::Image => "[Usuário enviou uma imagem]".into(),
        MessageKind::Audio => "[Usuário enviou um áudio]".into(),
        MessageKind::Video => "[Usuário enviou um vídeo]".into(),
        MessageKind::Document => "[Usuário enviou um documento]".into(),
        MessageKind::Other(raw) => format!("[Usuário enviou {raw}]"),
    }
}

impl EventBatch {
    pub fn from_json(raw: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(raw).map_err(|e| ChannelError::InvalidPayload(e.to_string()))
    }
}

impl EventRecord {
    /// Decode this record. `Ok(None)` means there is nothing to answer.
    pub fn decode(&self) -> Result<Option<InboundMessage>, ChannelError> {
        let body: NotificationBody = serde_json::from_str(&self.notification.message)
            .map_err(|e| ChannelError::InvalidPayload(format!("notification message: {e}")))?;
        let raw_entry = body.whatsapp_webhook_entry.unwrap_or_else(|| "{}".into());
        let entry: WebhookEntry = serde_json::from_str(&raw_entry)
            .map_err(|e| ChannelError::InvalidPayload(format!("whatsAppWebhookEntry: {e}")))?;
        Ok(entry.decode())
    }
}

impl WebhookPayload {
    /// One inbound message per entry that carries one.
    pub fn messages(&self) -> Vec<InboundMessage> {
        self.entry.iter().filter_map(WebhookEntry::decode).collect()
    }
}

impl WebhookEntry {
    /// Reduce an entry to its first user message.
    ///
    /// Entries with no changes, status updates, and changes without messages
    /// all yield `None`.
    pub fn decode(&self) -> Option<InboundMessage> {
        let Some(change) = self.changes.first() else {
            debug!("Webhook entry has no changes");
            return None;
        };
        let value = &change.value;

        if value.statuses.is_some() {
            info!("Status update received, skipping");
            return None;
        }

        let Some(message) = value.messages.as_ref().and_then(|m| m.first()) else {
            debug!("Webhook change has no messages");
            return None;
        };

        let kind = MessageKind::from_type(&message.message_type);
        let contact_name = value
            .contacts
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| DEFAULT_CONTACT_NAME.to_string());

        Some(InboundMessage {
            sender_phone: message.from.clone(),
            message_id: message.id.clone(),
            body_text: body_text(&kind, message.text.as_ref()),
            message_type: kind,
            contact_name,
            timestamp: message.timestamp.clone(),
        })
    }
}
