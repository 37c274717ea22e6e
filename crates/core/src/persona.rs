//! Personas: the three caller roles that gate tool access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three fixed caller roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Student,
    Teacher,
    Administrator,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Student, Persona::Teacher, Persona::Administrator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Student => "student",
            Persona::Teacher => "teacher",
            Persona::Administrator => "administrator",
        }
    }

    /// Parse a raw persona value, applying the `professor → teacher` remap.
    ///
    /// Matching ignores case and surrounding whitespace. Returns `None` for
    /// anything outside the three roles.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Persona::Student),
            "teacher" | "professor" => Some(Persona::Teacher),
            "administrator" => Some(Persona::Administrator),
            _ => None,
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Persona::parse(s).ok_or_else(|| {
            format!("Invalid persona: {s}. Must be one of: student, teacher, administrator")
        })
    }
}

/// The resolved caller identity for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaContext {
    pub persona: Persona,

    /// Directory identifier for the caller (student/teacher id, or the
    /// normalized phone number when nothing better is known).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    pub resolved_at: DateTime<Utc>,
}

impl PersonaContext {
    pub fn new(persona: Persona) -> Self {
        Self {
            persona,
            persona_id: None,
            display_name: None,
            resolved_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.persona_id = Some(id.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn professor_maps_to_teacher() {
        assert_eq!(Persona::parse("professor"), Some(Persona::Teacher));
        assert_eq!(Persona::parse("Professor "), Some(Persona::Teacher));
    }

    #[test]
    fn parse_known_personas() {
        for p in Persona::ALL {
            assert_eq!(Persona::parse(p.as_str()), Some(p));
        }
    }

    #[test]
    fn unknown_persona_is_rejected() {
        assert_eq!(Persona::parse("guardian"), None);
        let err = "guardian".parse::<Persona>().unwrap_err();
        assert!(err.contains("Invalid persona: guardian"));
    }

    #[test]
    fn default_is_student() {
        assert_eq!(Persona::default(), Persona::Student);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Persona::Administrator).unwrap();
        assert_eq!(json, "\"administrator\"");
    }
}
