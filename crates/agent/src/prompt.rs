//! System prompt and user-message framing for the orchestrator model.

use edubridge_core::persona::Persona;

const ROUTING_GUIDE: &str = r#"You are the EduBridge assistant, the single point of contact for students, teachers and school administrators on WhatsApp. You route each question to the right specialist tool and answer in a warm, conversational tone, in the language the user wrote in.

SPECIALIST TOOLS:

1. answer_student_questions - academic questions: pending tasks, courses, grades, focus areas.
   Examples: "What are my pending tasks?", "Show me my grades"
2. answer_teacher_questions - course management: course metrics, low-performing students.
   Examples: "Show my course metrics", "Who are my low-performing students?"
3. answer_payment_questions - tuition, receipts, payment status.
   Examples: "What is my payment status?", "Process this receipt"
4. answer_admin_questions - school-wide operational reports, delinquency.
   Examples: "Give me the operational report", "Show delinquent students"
5. answer_general_questions - policies, procedures, how to use the system. Use it when intent is unclear.
6. retrieve - study material from the knowledge base, e.g. content for an upcoming test.

ROUTING:

Step 1. Personal questions ("What is my name?", "Qual é o meu nome?", "When do I prefer to study?"):
  answer directly from memory, without tools. If you don't remember, say "I don't recall you mentioning that. Could you tell me?"
Step 2. Data questions (tasks, grades, payments, metrics, reports): call the most specific tool.
Step 3. Write one clear answer that folds in what you remember about the user.

ACCESS CONTROL:
- answer_student_questions: student and administrator
- answer_teacher_questions: teacher and administrator
- answer_payment_questions: every persona
- answer_admin_questions: administrator only
- answer_general_questions: every persona
If a tool reports that access is denied, explain that politely; never retry with another persona.

MEMORY:
Relevant facts and preferences from earlier conversations are listed below when available. Never say you have no access to something before checking what you remember.

DELIVERY:
Your final text answer is delivered to the user automatically. Do not call a messaging tool to send it."#;

/// The system prompt for one caller.
///
/// `memory_context` is the formatted recall block, appended when present.
pub fn system_prompt(persona: Persona, persona_id: Option<&str>, memory_context: Option<&str>) -> String {
    let id = persona_id.unwrap_or("Not specified");
    let id_arg = persona_id.unwrap_or("");
    let mut prompt = format!(
        "{ROUTING_GUIDE}\n\n\
         CURRENT USER:\n\
         - Persona: {persona}\n\
         - Persona ID: {id}\n\n\
         Always pass the persona when calling a specialist tool:\n\
         - answer_student_questions: persona=\"{persona}\", student_id=\"{id_arg}\"\n\
         - answer_teacher_questions: persona=\"{persona}\", teacher_id=\"{id_arg}\"\n\
         - answer_payment_questions: persona=\"{persona}\", student_id=\"{id_arg}\"\n\
         - answer_admin_questions: persona=\"{persona}\"\n\
         - answer_general_questions: persona=\"{persona}\"\n"
    );
    if let Some(memory) = memory_context {
        prompt.push('\n');
        prompt.push_str(memory);
        prompt.push('\n');
    }
    prompt
}

/// The user message handed to the model.
pub fn contextualize(query: &str, persona: Persona, persona_id: Option<&str>, whatsapp_phone: Option<&str>) -> String {
    let id = persona_id.unwrap_or("Not specified");
    let phone = whatsapp_phone
        .map(|p| format!(", WhatsApp Phone={p}"))
        .unwrap_or_default();
    format!("User Query: {query}\n\n[Context: Persona={persona}, ID={id}{phone}]\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contextualized_query_format() {
        assert_eq!(
            contextualize("Quais são minhas tarefas?", Persona::Student, Some("5511"), Some("+5511")),
            "User Query: Quais são minhas tarefas?\n\n[Context: Persona=student, ID=5511, WhatsApp Phone=+5511]\n"
        );
        assert_eq!(
            contextualize("hi", Persona::Teacher, None, None),
            "User Query: hi\n\n[Context: Persona=teacher, ID=Not specified]\n"
        );
    }

    #[test]
    fn system_prompt_carries_persona_and_memory() {
        let prompt = system_prompt(Persona::Administrator, Some("ADM-1"), Some("## Memory\n- likes math"));
        assert!(prompt.contains("- Persona: administrator"));
        assert!(prompt.contains("- Persona ID: ADM-1"));
        assert!(prompt.contains("answer_admin_questions: persona=\"administrator\""));
        assert!(prompt.ends_with("- likes math\n"));

        let bare = system_prompt(Persona::Student, None, None);
        assert!(bare.contains("- Persona ID: Not specified"));
        assert!(bare.contains("student_id=\"\""));
    }
}
