//! `answer_general_questions`: policies, procedures and platform help.

use async_trait::async_trait;
use edubridge_core::error::ToolError;
use edubridge_core::tool::{Tool, ToolResult};

use crate::access::{Access, PersonaBinding};
use crate::query_argument;
use crate::sub_agent::SubAgent;

const NAME: &str = "answer_general_questions";

const SYSTEM_PROMPT: &str = "You are a General Questions Assistant for the educational system.

You can provide information about:
- School policies and procedures (enrollment, attendance, grading policies)
- General educational topics (curriculum, teaching methods, learning resources)
- System navigation and usage (how to use the platform, where to find information)
- Common questions about the educational platform (features, capabilities, support)

When a question requires specialized knowledge or personal data, indicate routing:
1. Student-specific queries (grades, tasks, courses) → Educational Assistant
2. Teacher-specific queries (course metrics, student performance) → Teacher Assistant
3. Payment-specific queries (tuition, receipts, payment status) → Financial Assistant
4. Administrator-specific queries (operational reports) → Virtual Secretary

For general questions, provide helpful, accurate information in a friendly manner.
Format your responses clearly and professionally.";

const SYSTEM_FACTS: &str = "GRADING SYSTEM:
- Grades are on a 0-10 scale
- 5.0 is the passing grade
- Grades below 5.0 require additional support

PAYMENT SYSTEM:
- Monthly tuition is $600.00 per month
- Payments are due on the 1st of each month

COURSE SYSTEM:
- Students can enroll in multiple courses
- Each course has assigned teachers
- Tasks and assignments have due dates

SUPPORT SYSTEM:
- Educational Assistant: Helps students with academic queries
- Teacher Assistant: Helps teachers manage courses
- Financial Assistant: Helps with payment queries
- Virtual Secretary: Provides administrative reports
- General Questions: Answers general system questions";

pub struct GeneralQuestionsTool {
    binding: PersonaBinding,
    agent: SubAgent,
}

impl GeneralQuestionsTool {
    pub fn new(binding: PersonaBinding, agent: SubAgent) -> Self {
        Self { binding, agent }
    }
}

#[async_trait]
impl Tool for GeneralQuestionsTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Answers general questions about the educational system: school policies and procedures, grading and payment rules, platform usage and support. Available to all personas."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The general question about the educational system" },
                "persona": { "type": "string", "description": "The persona making the request", "default": "student" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;
        let persona = self.binding.effective(NAME, &arguments);
        if let Err(denial) = Access::All.check(persona) {
            return Ok(ToolResult::text(denial));
        }

        let context = format!(
            "Educational System Information:\n[Requesting Persona: {persona}]\n\n{SYSTEM_FACTS}\n\nUser Query: {query}\n"
        );
        let answer = self.agent.ask(NAME, SYSTEM_PROMPT, context).await?;
        Ok(ToolResult::text(answer))
    }
}
