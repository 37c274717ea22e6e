//! `answer_student_questions`: tasks, courses, grades and focus areas.

use async_trait::async_trait;
use edubridge_core::error::ToolError;
use edubridge_core::tool::{Tool, ToolResult};

use crate::access::{Access, PersonaBinding};
use crate::mock_data::{self, FOCUS_THRESHOLD, StudentData};
use crate::sub_agent::SubAgent;
use crate::{query_argument, with_data};

const NAME: &str = "answer_student_questions";

const SYSTEM_PROMPT: &str = "You are an Educational Assistant that helps students with academic queries.

You can provide information about:
- Pending tasks and assignments
- Enrolled courses and teachers
- Current grades
- Subjects requiring focus (grade < 5.0)

Use the academic data provided to answer student questions in a helpful and encouraging manner.
Be supportive and provide actionable advice when students are struggling.
Format your responses clearly and concisely.

When discussing grades:
- Grades are on a 0-10 scale
- Grades below 5.0 indicate areas needing focus
- Encourage students to seek help in challenging subjects

When discussing tasks:
- Prioritize tasks by due date
- Encourage time management
- Suggest breaking down complex assignments";

pub struct StudentQuestionsTool {
    binding: PersonaBinding,
    agent: SubAgent,
}

impl StudentQuestionsTool {
    pub fn new(binding: PersonaBinding, agent: SubAgent) -> Self {
        Self { binding, agent }
    }
}

pub(crate) fn format_context(data: &StudentData, persona: &str, query: &str) -> String {
    let courses = if data.enrolled_courses.is_empty() {
        "No enrolled courses".to_string()
    } else {
        data.enrolled_courses
            .iter()
            .map(|c| format!("  - {} ({}) - Teacher: {}", c.course_name, c.course_id, c.teacher_name))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let grades = if data.grades.is_empty() {
        "No grades available".to_string()
    } else {
        data.grades
            .iter()
            .map(|g| {
                let status = if g.grade < FOCUS_THRESHOLD { "⚠️ Needs Focus" } else { "✓ Good" };
                format!("  - {}: {:.1}/10.0 {status}", g.course_name, g.grade)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let tasks = if data.pending_tasks.is_empty() {
        "No pending tasks".to_string()
    } else {
        data.pending_tasks
            .iter()
            .map(|t| format!("  - {}: {} (Due: {})", t.course_name, t.task_id, t.due_date))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let focus = if data.focus_areas.is_empty() {
        "None - all grades are satisfactory!".to_string()
    } else {
        data.focus_areas.join(", ")
    };

    format!(
        "Academic Data for {} (ID: {}):\n[Requesting Persona: {persona}]\n\n\
         Enrolled Courses:\n{courses}\n\n\
         Current Grades:\n{grades}\n\n\
         Pending Tasks:\n{tasks}\n\n\
         Focus Areas (grades < 5.0):\n{focus}\n\n\
         Student Query: {query}\n",
        data.student_name, data.student_id
    )
}

#[async_trait]
impl Tool for StudentQuestionsTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Answers student academic questions: pending tasks and assignments, enrolled courses and teachers, current grades, and subjects requiring focus (grade < 5.0). Available to student and administrator personas."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The student's question" },
                "student_id": { "type": "string", "description": "Student ID for personalized data" },
                "persona": { "type": "string", "description": "The persona making the request", "default": "student" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;
        let persona = self.binding.effective(NAME, &arguments);
        if let Err(denial) = Access::StudentAndAdministrator.check(persona) {
            return Ok(ToolResult::text(denial));
        }

        let student_id = self.binding.subject_id(&arguments, "student_id");
        let data = mock_data::generate_student(student_id.as_deref());
        let answer = self
            .agent
            .ask(NAME, SYSTEM_PROMPT, format_context(&data, persona.as_str(), query))
            .await?;
        Ok(with_data(answer, &data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sub_agent::testing::EchoProvider;
    use chrono::NaiveDate;
    use edubridge_core::persona::Persona;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use std::sync::Arc;

    fn tool(persona: Persona, provider: Arc<EchoProvider>) -> StudentQuestionsTool {
        StudentQuestionsTool::new(
            PersonaBinding::new(persona, Some("5511999990000".into())),
            SubAgent::new(provider, "m", 0.3),
        )
    }

    #[tokio::test]
    async fn student_gets_academic_context() {
        let provider = Arc::new(EchoProvider::default());
        let result = tool(Persona::Student, provider.clone())
            .execute(json!({"query": "Quais são minhas tarefas?"}))
            .await
            .unwrap();

        assert!(result.success);
        let sent = provider.last_user_message();
        assert!(sent.contains("(ID: 5511999990000)"));
        assert!(sent.contains("[Requesting Persona: student]"));
        assert!(sent.ends_with("Student Query: Quais são minhas tarefas?\n"));
        assert!(result.data.unwrap()["enrolled_courses"].is_array());
    }

    #[tokio::test]
    async fn teacher_is_denied_without_model_call() {
        let provider = Arc::new(EchoProvider::default());
        let result = tool(Persona::Teacher, provider.clone())
            .execute(json!({"query": "grades", "persona": "student"}))
            .await
            .unwrap();
        assert_eq!(
            result.output,
            "Access denied: This tool is only available for student and administrator personas. Current persona: teacher"
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let err = tool(Persona::Student, Arc::new(EchoProvider::default()))
            .execute(json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn context_marks_focus_areas() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut data = mock_data::student(&mut rng, Some("STU-001"), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        data.grades[0].grade = 4.2;
        data.focus_areas = vec![data.grades[0].course_name.clone()];
        let ctx = format_context(&data, "student", "q");
        assert!(ctx.contains("4.2/10.0 ⚠️ Needs Focus"));
        assert!(ctx.contains(&format!("Focus Areas (grades < 5.0):\n{}", data.grades[0].course_name)));
    }
}
