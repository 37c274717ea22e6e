//! `answer_teacher_questions`: course metrics, pending work, struggling students.

use async_trait::async_trait;
use edubridge_core::error::ToolError;
use edubridge_core::tool::{Tool, ToolResult};

use crate::access::{Access, PersonaBinding};
use crate::mock_data::{self, TeacherData};
use crate::sub_agent::SubAgent;
use crate::{query_argument, with_data};

const NAME: &str = "answer_teacher_questions";

const SYSTEM_PROMPT: &str = "You are a Teacher Assistant that helps teachers manage their courses.

You can provide information about:
- Course metrics (student counts, overdue tasks)
- Pending tasks from students
- Low-performing students (grade < 5.0)
- Course subjects taught

Use the course data provided to answer teacher questions professionally.
Be supportive and provide actionable insights for course management.
Format your responses clearly and concisely.

When discussing student performance:
- Grades are on a 0-10 scale
- Grades below 5.0 indicate students needing additional support
- Suggest intervention strategies for struggling students
- Highlight positive trends when present

When discussing tasks:
- Prioritize overdue tasks
- Suggest strategies for improving task completion rates
- Encourage proactive communication with students";

pub struct TeacherQuestionsTool {
    binding: PersonaBinding,
    agent: SubAgent,
}

impl TeacherQuestionsTool {
    pub fn new(binding: PersonaBinding, agent: SubAgent) -> Self {
        Self { binding, agent }
    }
}

fn bullet_list<T>(items: &[T], empty: &str, line: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items.iter().map(line).collect::<Vec<_>>().join("\n")
}

pub(crate) fn format_context(data: &TeacherData, persona: &str, query: &str) -> String {
    let courses = bullet_list(&data.courses, "No courses assigned", |c| {
        format!(
            "  - {} ({}): {} students, {} overdue tasks",
            c.course_name, c.course_id, c.student_count, c.overdue_tasks
        )
    });
    let tasks = bullet_list(&data.pending_tasks, "No pending tasks from students", |t| {
        format!("  - {}: Task {} (Due: {})", t.course_name, t.task_id, t.due_date)
    });
    let low = bullet_list(
        &data.low_performers,
        "No students with grades below 5.0 - excellent work!",
        |lp| {
            format!(
                "  - {} ({}): {} - Grade: {:.1}/10.0 ⚠️",
                lp.student_name, lp.student_id, lp.course_name, lp.grade
            )
        },
    );

    format!(
        "Teacher Data for {} (ID: {}):\n[Requesting Persona: {persona}]\n\n\
         Courses Taught:\n{courses}\n\n\
         Pending Tasks from Students:\n{tasks}\n\n\
         Low-Performing Students (grade < 5.0):\n{low}\n\n\
         Teacher Query: {query}\n",
        data.teacher_name, data.teacher_id
    )
}

#[async_trait]
impl Tool for TeacherQuestionsTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Answers teacher course-management questions: course metrics, pending tasks from students, and low-performing students. Available to teacher and administrator personas."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The teacher's question" },
                "teacher_id": { "type": "string", "description": "Teacher ID for personalized data" },
                "persona": { "type": "string", "description": "The persona making the request", "default": "teacher" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;
        let persona = self.binding.effective(NAME, &arguments);
        if let Err(denial) = Access::TeacherAndAdministrator.check(persona) {
            return Ok(ToolResult::text(denial));
        }

        let teacher_id = self.binding.subject_id(&arguments, "teacher_id");
        let data = mock_data::generate_teacher(teacher_id.as_deref());
        let answer = self
            .agent
            .ask(NAME, SYSTEM_PROMPT, format_context(&data, persona.as_str(), query))
            .await?;
        Ok(with_data(answer, &data))
    }
}
