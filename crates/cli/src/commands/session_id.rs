//! `edubridge session-id`: print the hour-bucketed session id for a phone.

use chrono::{DateTime, Utc};
use edubridge_core::session::derive_session_id;

pub fn run(phone: &str, at: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", session_id_at(phone, at)?);
    Ok(())
}

fn session_id_at(phone: &str, at: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    let now = match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("Invalid --at '{raw}': {e}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    Ok(derive_session_id(phone, now)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_hour_same_id() {
        let a = session_id_at("+5511999990000", Some("2026-10-18T14:05:00Z")).unwrap();
        let b = session_id_at("+5511999990000", Some("2026-10-18T14:55:00Z")).unwrap();
        let c = session_id_at("+5511999990000", Some("2026-10-18T15:05:00Z")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("whatsapp-5511999990000-2026-10-18-14-"));
    }

    #[test]
    fn offsets_are_converted_to_utc() {
        let local = session_id_at("+5511999990000", Some("2026-10-18T11:30:00-03:00")).unwrap();
        assert!(local.contains("-2026-10-18-14-"));
    }

    #[test]
    fn bad_input() {
        assert!(session_id_at("+5511999990000", Some("yesterday")).is_err());
        assert!(session_id_at("", None).is_err());
    }
}
