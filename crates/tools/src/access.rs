//! Persona allow-lists for the local tools.

use edubridge_core::persona::{Persona, PersonaContext};
use tracing::debug;

/// Which personas may call a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    All,
    StudentAndAdministrator,
    TeacherAndAdministrator,
    AdministratorOnly,
}

impl Access {
    pub fn allows(&self, persona: Persona) -> bool {
        match self {
            Access::All => true,
            Access::StudentAndAdministrator => {
                matches!(persona, Persona::Student | Persona::Administrator)
            }
            Access::TeacherAndAdministrator => {
                matches!(persona, Persona::Teacher | Persona::Administrator)
            }
            Access::AdministratorOnly => persona == Persona::Administrator,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Access::All => "all",
            Access::StudentAndAdministrator => "student and administrator",
            Access::TeacherAndAdministrator => "teacher and administrator",
            Access::AdministratorOnly => "administrator",
        }
    }

    /// `Err` carries the denial text handed back to the model.
    pub fn check(&self, persona: Persona) -> Result<(), String> {
        if self.allows(persona) {
            Ok(())
        } else {
            Err(format!(
                "Access denied: This tool is only available for {} personas. Current persona: {persona}",
                self.label()
            ))
        }
    }
}

/// The allow-list for a local tool name. Unknown names are unrestricted.
pub fn access_for(tool_name: &str) -> Access {
    match tool_name {
        "answer_student_questions" => Access::StudentAndAdministrator,
        "answer_teacher_questions" => Access::TeacherAndAdministrator,
        "answer_admin_questions" => Access::AdministratorOnly,
        _ => Access::All,
    }
}

/// The caller a per-request tool instance acts for.
///
/// Tools accept a `persona` argument so their schema matches what the
/// model is told about, but the bound persona always decides access.
#[derive(Debug, Clone)]
pub struct PersonaBinding {
    pub persona: Persona,
    pub persona_id: Option<String>,
}

impl PersonaBinding {
    pub fn new(persona: Persona, persona_id: Option<String>) -> Self {
        Self { persona, persona_id }
    }

    pub fn from_context(ctx: &PersonaContext) -> Self {
        Self::new(ctx.persona, ctx.persona_id.clone())
    }

    /// The persona to act as for one call.
    pub fn effective(&self, tool_name: &str, arguments: &serde_json::Value) -> Persona {
        if let Some(claimed) = arguments["persona"].as_str()
            && Persona::parse(claimed) != Some(self.persona)
        {
            debug!(
                tool = tool_name,
                claimed,
                bound = %self.persona,
                "Ignoring model-supplied persona"
            );
        }
        self.persona
    }

    /// An id argument if the model supplied one, else the bound id.
    pub fn subject_id(&self, arguments: &serde_json::Value, field: &str) -> Option<String> {
        arguments[field]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| self.persona_id.clone())
    }
}
