//! `answer_admin_questions`: school-wide operational reports.

use async_trait::async_trait;
use edubridge_core::error::ToolError;
use edubridge_core::tool::{Tool, ToolResult};

use crate::access::{Access, PersonaBinding};
use crate::mock_data::{self, AdministratorData, LowPerformingStudent, PaymentInfo, TeacherMetrics};
use crate::sub_agent::SubAgent;
use crate::{query_argument, with_data};

const NAME: &str = "answer_admin_questions";

const SYSTEM_PROMPT: &str = "You are a Virtual Secretary that provides operational reports to administrators.

You can provide information about:
- Delinquent student payments
- Low-performing students across all courses
- Teacher performance metrics
- Operational insights and recommendations

Use the data provided to answer administrative questions comprehensively.
Be professional and provide actionable insights for school management.
Format your responses clearly and concisely.

When discussing delinquent payments:
- Monthly tuition is 600.00 per month
- Highlight students with multiple unpaid months
- Calculate total outstanding amounts
- Suggest follow-up actions

When discussing student performance:
- Grades are on a 0-10 scale
- Grades below 5.0 indicate students needing intervention
- Identify patterns across courses
- Suggest support programs or interventions

When discussing teacher performance:
- Highlight teachers with high workloads
- Recognize teachers with excellent student outcomes
- Identify teachers who may need support
- Provide balanced, constructive insights";

pub struct AdminQuestionsTool {
    binding: PersonaBinding,
    agent: SubAgent,
}

impl AdminQuestionsTool {
    pub fn new(binding: PersonaBinding, agent: SubAgent) -> Self {
        Self { binding, agent }
    }
}

fn format_delinquent(students: &[PaymentInfo]) -> String {
    if students.is_empty() {
        return "No delinquent students - all payments are current!".to_string();
    }
    let mut lines = Vec::new();
    let mut total = 0.0;
    for s in students {
        lines.push(format!(
            "  ⚠️ {} ({})",
            s.student_name.as_deref().unwrap_or("Unknown"),
            s.student_id
        ));
        lines.push(format!("     Unpaid Months: {}", s.unpaid_months.join(", ")));
        lines.push(format!("     Amount Due: ${:.2}", s.amount_due));
        lines.push(String::new());
        total += s.amount_due;
    }
    lines.push(format!("TOTAL OUTSTANDING: ${total:.2}"));
    lines.push(format!("Number of Delinquent Students: {}", students.len()));
    lines.join("\n")
}

/// Grouped by student, first appearance order.
fn format_low_performers(students: &[LowPerformingStudent]) -> String {
    if students.is_empty() {
        return "No students with grades below 5.0 - excellent academic performance!".to_string();
    }
    let mut groups: Vec<(String, Vec<&LowPerformingStudent>)> = Vec::new();
    for lp in students {
        let key = format!("{} ({})", lp.student_name, lp.student_id);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, entries)) => entries.push(lp),
            None => groups.push((key, vec![lp])),
        }
    }

    let mut lines = Vec::new();
    for (student, entries) in &groups {
        lines.push(format!("  ⚠️ {student}"));
        for lp in entries {
            lines.push(format!("     - {}: {:.1}/10.0", lp.course_name, lp.grade));
        }
        lines.push(String::new());
    }
    lines.push(format!("Total Students Needing Support: {}", groups.len()));
    lines.push(format!("Total Course Failures: {}", students.len()));
    lines.join("\n")
}

fn format_teachers(teachers: &[TeacherMetrics]) -> String {
    if teachers.is_empty() {
        return "No teacher performance data available".to_string();
    }
    let mut lines = Vec::new();
    for t in teachers {
        lines.push(format!("  📊 {} ({})", t.teacher_name, t.teacher_id));
        lines.push(format!("     Classes Taught (Last Week): {}", t.classes_taught_last_week));
        lines.push(format!("     Grades Published (Last Week): {}", t.grades_published_last_week));
        lines.push(format!("     Students Below Average: {:.1}%", t.below_average_percentage));
        if !t.insights.is_empty() {
            lines.push("     Insights:".to_string());
            for insight in &t.insights {
                lines.push(format!("       • {insight}"));
            }
        }
        lines.push(String::new());
    }

    let n = teachers.len() as f64;
    let avg_classes = teachers.iter().map(|t| t.classes_taught_last_week as f64).sum::<f64>() / n;
    let avg_grades = teachers.iter().map(|t| t.grades_published_last_week as f64).sum::<f64>() / n;
    let avg_below = teachers.iter().map(|t| t.below_average_percentage).sum::<f64>() / n;

    lines.push("=== SUMMARY STATISTICS ===".to_string());
    lines.push(format!("Average Classes Taught: {avg_classes:.1}"));
    lines.push(format!("Average Grades Published: {avg_grades:.1}"));
    lines.push(format!("Average Below-Average Rate: {avg_below:.1}%"));
    lines.push(format!("Total Teachers: {}", teachers.len()));
    lines.join("\n")
}

fn format_context(data: &AdministratorData, persona: &str, query: &str) -> String {
    format!(
        "Administrative Data:\n[Requesting Persona: {persona}]\n[Access Level: Full System Scope]\n\n\
         === DELINQUENT STUDENTS (Payment Issues) ===\n{}\n\n\
         === LOW-PERFORMING STUDENTS (Academic Issues) ===\n{}\n\n\
         === TEACHER PERFORMANCE METRICS ===\n{}\n\n\
         Administrator Query: {query}\n",
        format_delinquent(&data.delinquent_students),
        format_low_performers(&data.low_performing_students),
        format_teachers(&data.teacher_performance),
    )
}

#[async_trait]
impl Tool for AdminQuestionsTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Answers administrative operational questions: delinquent payments, low-performing students across all courses, teacher performance metrics, and operational recommendations. Available to administrator personas only."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The administrator's question" },
                "persona": { "type": "string", "description": "The persona making the request", "default": "administrator" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;
        let persona = self.binding.effective(NAME, &arguments);
        if let Err(denial) = Access::AdministratorOnly.check(persona) {
            return Ok(ToolResult::text(denial));
        }

        let data = mock_data::generate_administrator();
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
    use crate::mock_data::PaymentStatus;
    use crate::sub_agent::testing::EchoProvider;
    use edubridge_core::persona::Persona;
    use serde_json::json;
    use std::sync::Arc;

    fn low(name: &str, id: &str, course: &str, grade: f64) -> LowPerformingStudent {
        LowPerformingStudent {
            student_id: id.into(),
            student_name: name.into(),
            course_name: course.into(),
            course_id: "X-100".into(),
            grade,
        }
    }

    #[test]
    fn low_performers_grouped_by_student() {
        let text = format_low_performers(&[
            low("Ana Costa", "STU-001", "Physics", 3.5),
            low("João Silva", "STU-002", "History", 4.0),
            low("Ana Costa", "STU-001", "Chemistry", 2.1),
        ]);
        assert!(text.starts_with("  ⚠️ Ana Costa (STU-001)\n     - Physics: 3.5/10.0\n     - Chemistry: 2.1/10.0\n"));
        assert!(text.ends_with("Total Students Needing Support: 2\nTotal Course Failures: 3"));
    }

    #[test]
    fn delinquent_totals() {
        let students: Vec<PaymentInfo> = [1200.0, 600.0]
            .iter()
            .map(|amount| PaymentInfo {
                student_id: "STU-010".into(),
                student_name: Some("Rafael Alves".into()),
                unpaid_months: vec!["September 2026".into()],
                amount_due: *amount,
                payment_month: None,
                status: PaymentStatus::Overdue,
                receipt_id: None,
            })
            .collect();
        let text = format_delinquent(&students);
        assert!(text.contains("TOTAL OUTSTANDING: $1800.00"));
        assert!(text.contains("Number of Delinquent Students: 2"));
    }

    #[test]
    fn teacher_summary_averages() {
        let metrics = |classes, grades, below| TeacherMetrics {
            teacher_id: "TEACH-001".into(),
            teacher_name: "Prof. Silva".into(),
            classes_taught_last_week: classes,
            grades_published_last_week: grades,
            below_average_percentage: below,
            insights: vec!["Normal performance metrics".into()],
        };
        let text = format_teachers(&[metrics(4, 10, 12.0), metrics(6, 15, 18.0)]);
        assert!(text.contains("Average Classes Taught: 5.0"));
        assert!(text.contains("Average Grades Published: 12.5"));
        assert!(text.contains("Average Below-Average Rate: 15.0%"));
        assert!(text.contains("       • Normal performance metrics"));
    }

    #[tokio::test]
    async fn only_administrators() {
        for (persona, allowed) in [
            (Persona::Student, false),
            (Persona::Teacher, false),
            (Persona::Administrator, true),
        ] {
            let provider = Arc::new(EchoProvider::default());
            let tool = AdminQuestionsTool::new(
                PersonaBinding::new(persona, None),
                SubAgent::new(provider.clone(), "m", 0.3),
            );
            let result = tool.execute(json!({"query": "Relatório da semana"})).await.unwrap();
            if allowed {
                assert!(result.output.contains("[Access Level: Full System Scope]"));
            } else {
                assert_eq!(
                    result.output,
                    format!("Access denied: This tool is only available for administrator personas. Current persona: {persona}")
                );
            }
            assert_eq!(provider.calls(), usize::from(allowed));
        }
    }
}
