//! WhatsApp Cloud API channel.
//!
//! Outbound text and read receipts both go through
//! `POST {api_base}/{version}/{phone_number_id}/messages` with a bearer token.

use async_trait::async_trait;
use edubridge_config::WhatsAppConfig;
use edubridge_core::channel::{Channel, DeliveryReceipt};
use edubridge_core::error::ChannelError;
use edubridge_core::session::to_e164;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Maximum body length of a single text message.
pub const MAX_TEXT_LEN: usize = 4096;

const CHANNEL: &str = "whatsapp";

pub struct WhatsAppChannel {
    api_base: String,
    api_version: String,
    phone_number_id: String,
    access_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for WhatsAppChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppChannel")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    message: String,
}

impl WhatsAppChannel {
    /// Build from `[whatsapp]`. Fails when the phone number id or token is missing.
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, ChannelError> {
        let phone_number_id = config
            .phone_number_id
            .clone()
            .ok_or_else(|| ChannelError::NotConfigured("whatsapp.phone_number_id".into()))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| ChannelError::NotConfigured("whatsapp.access_token".into()))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            phone_number_id,
            access_token,
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base, self.api_version, self.phone_number_id
        )
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, ChannelError> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status, &text))
    }

    async fn send_part(&self, to: &str, body: &str) -> Result<String, ChannelError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "preview_url": false, "body": body },
        });
        let response = self.post(&payload).await?;
        let invalid = |reason: String| ChannelError::DeliveryFailed {
            channel: CHANNEL.into(),
            code: "invalid_response".into(),
            reason,
        };
        let sent: SendResponse = response.json().await.map_err(|e| invalid(e.to_string()))?;
        sent.messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| invalid("accepted without a message id".into()))
    }
}

/// Turn a non-success response into `DeliveryFailed` carrying `code: message`.
fn classify_error(status: u16, body: &str) -> ChannelError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let code = match env.error.code {
                serde_json::Value::Null => status.to_string(),
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            ChannelError::DeliveryFailed {
                channel: CHANNEL.into(),
                code,
                reason: env.error.message,
            }
        }
        Err(_) => ChannelError::DeliveryFailed {
            channel: CHANNEL.into(),
            code: status.to_string(),
            reason: body.to_string(),
        },
    }
}

/// Split text into parts of at most `max` characters, on char boundaries.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, to: &str, content: &str) -> Result<DeliveryReceipt, ChannelError> {
        let destination = to_e164(to);
        if destination.len() < 2 || !destination[1..].chars().all(|c| c.is_ascii_digit()) {
            return Err(ChannelError::InvalidDestination(to.to_string()));
        }

        let parts = split_message(content, MAX_TEXT_LEN);
        debug!(to = %destination, parts = parts.len(), "Sending WhatsApp message");

        let mut message_ids = Vec::with_capacity(parts.len());
        for part in &parts {
            message_ids.push(self.send_part(&destination, part).await?);
        }

        info!(to = %destination, message_id = %message_ids[0], "WhatsApp message sent");
        Ok(DeliveryReceipt { message_ids })
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), ChannelError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "message_id": message_id,
            "status": "read",
        });
        self.post(&payload).await.map(|_| ()).inspect_err(|e| {
            warn!(message_id, error = %e, "Failed to mark message as read");
        })
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(!self.phone_number_id.is_empty() && !self.access_token.is_empty())
    }
}
