//! `X-Hub-Signature-256` verification for direct webhook deliveries.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verify a `sha256=<hex>` signature over `payload` with the app secret.
///
/// Uses constant-time comparison via `verify_slice`.
pub fn verify_signature(app_secret: &str, payload: &[u8], header: &str) -> bool {
    let Some(sig_hex) = header.strip_prefix("sha256=") else {
        warn!("Signature header missing sha256= prefix");
        return false;
    };

    let Ok(provided) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

/// Compute the header value for a payload. Used by clients and tests.
pub fn sign(app_secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_accepted() {
        let body = br#"{"object":"whatsapp_business_account","entry":[]}"#;
        let header = sign("app-secret", body).unwrap();
        assert!(verify_signature("app-secret", body, &header));
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"payload";
        let header = sign("app-secret", body).unwrap();
        assert!(!verify_signature("other-secret", body, &header));
    }

    #[test]
    fn tampered_body_rejected() {
        let header = sign("s", b"original").unwrap();
        assert!(!verify_signature("s", b"tampered", &header));
    }

    #[test]
    fn malformed_header_rejected() {
        assert!(!verify_signature("s", b"x", "deadbeef"));
        assert!(!verify_signature("s", b"x", "sha256=not-hex"));
    }
}
