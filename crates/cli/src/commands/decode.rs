//! `edubridge decode`: show what the gateway would answer in a saved payload.
//!
//! Accepts either a notification batch (`{"Records": [...]}`) or a direct
//! webhook delivery (`{"object": ..., "entry": [...]}`) and prints one JSON
//! line per decoded message.

use edubridge_channels::{EventBatch, WebhookPayload};
use edubridge_core::channel::InboundMessage;
use std::io::Read;
use std::path::Path;

pub fn run(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = if input == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(input).map_err(|e| format!("Failed to read {}: {e}", input.display()))?
    };

    let messages = decode(&raw)?;
    if messages.is_empty() {
        eprintln!("No answerable messages (status updates and empty entries are skipped)");
    }
    for message in &messages {
        println!("{}", serde_json::to_string(message)?);
    }
    Ok(())
}

fn decode(raw: &[u8]) -> Result<Vec<InboundMessage>, Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    if value.get("Records").is_some() {
        let batch = EventBatch::from_json(raw)?;
        let mut out = Vec::new();
        for record in &batch.records {
            if let Some(message) = record.decode()? {
                out.push(message);
            }
        }
        Ok(out)
    } else {
        let payload: WebhookPayload = serde_json::from_value(value)?;
        Ok(payload.messages())
    }
}
