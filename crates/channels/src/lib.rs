//! WhatsApp transport for EduBridge.
//!
//! - **envelope**: decodes notification batches and direct webhook payloads
//!   into `InboundMessage`s
//! - **signature**: `X-Hub-Signature-256` verification
//! - **whatsapp**: the outbound `Channel` (text delivery, read receipts)

pub mod envelope;
pub mod signature;
pub mod whatsapp;

pub use envelope::{EventBatch, EventRecord, WebhookEntry, WebhookPayload};
pub use signature::verify_signature;
pub use whatsapp::WhatsAppChannel;
