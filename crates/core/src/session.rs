//! Session identity derived from the sender's phone and the UTC hour.
//!
//! There is no session store: the same sender within the same UTC hour
//! always maps to the same id, and the next hour starts a fresh session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Minimum session id length accepted by the memory service.
pub const MIN_SESSION_ID_LEN: usize = 33;

const SESSION_PREFIX: &str = "whatsapp";

/// Strip `+`, `-` and spaces from a phone number.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '+' | '-' | ' '))
        .collect()
}

/// Format a phone number as E.164 with a leading `+`.
pub fn to_e164(raw: &str) -> String {
    format!("+{}", normalize_phone(raw))
}

/// UTC hour bucket, e.g. `2025-11-03-14`.
pub fn hour_bucket(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H").to_string()
}

/// Derive the session id for a sender at a given instant.
///
/// `whatsapp-{normalized}-{hour}-{sha256(raw)[..8]}`
pub fn derive_session_id(raw_phone: &str, now: DateTime<Utc>) -> crate::Result<String> {
    let normalized = normalize_phone(raw_phone);
    if normalized.is_empty() {
        return Err(Error::Validation(
            "cannot derive a session id from an empty phone number".into(),
        ));
    }

    let digest = Sha256::digest(raw_phone.as_bytes());
    let hash = hex::encode(digest);

    let session_id = format!(
        "{SESSION_PREFIX}-{normalized}-{}-{}",
        hour_bucket(now),
        &hash[..8]
    );

    validate_session_id(&session_id)?;
    Ok(session_id)
}

/// Check the length constraint imposed by the memory service.
pub fn validate_session_id(session_id: &str) -> crate::Result<()> {
    if session_id.len() < MIN_SESSION_ID_LEN {
        return Err(Error::Validation(format!(
            "session id '{session_id}' is shorter than {MIN_SESSION_ID_LEN} characters"
        )));
    }
    Ok(())
}

/// The per-request binding between a session, its actor and the memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub actor_id: String,
    pub memory_id: String,
}
