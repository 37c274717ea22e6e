//! `send_whatsapp_message`: outbound text through a messaging channel.

use async_trait::async_trait;
use edubridge_core::channel::Channel;
use edubridge_core::error::ToolError;
use edubridge_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use tracing::info;

pub const NAME: &str = "send_whatsapp_message";

pub struct SendMessageTool {
    channel: Arc<dyn Channel>,
}

impl SendMessageTool {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }
}

fn non_empty<'a>(arguments: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    arguments[field].as_str().map(str::trim).filter(|s| !s.is_empty())
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Sends a WhatsApp text message to a phone number. Returns the message id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "phone_number": {
                    "type": "string",
                    "description": "Recipient WhatsApp number (format: +5511999999999)"
                },
                "message": {
                    "type": "string",
                    "description": "Text of the message to send"
                }
            },
            "required": ["phone_number", "message"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let (Some(phone), Some(message)) = (
            non_empty(&arguments, "phone_number"),
            non_empty(&arguments, "message"),
        ) else {
            return Ok(ToolResult {
                success: false,
                ..ToolResult::text("phone_number and message are required")
            });
        };

        let receipt = self
            .channel
            .send(phone, message)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        info!(channel = self.channel.name(), message_id = receipt.message_id(), "Message sent by tool");
        Ok(ToolResult {
            data: Some(serde_json::json!({ "message_ids": receipt.message_ids })),
            ..ToolResult::text(receipt.message_id())
        })
    }
}
