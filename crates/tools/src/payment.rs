//! `answer_payment_questions`: tuition status, receipts, overdue months.

use async_trait::async_trait;
use edubridge_core::error::ToolError;
use edubridge_core::tool::{Tool, ToolResult};

use crate::access::{Access, PersonaBinding};
use crate::mock_data::{self, MONTHLY_TUITION, PaymentInfo, PaymentStatus};
use crate::sub_agent::SubAgent;
use crate::{query_argument, with_data};

const NAME: &str = "answer_payment_questions";

const SYSTEM_PROMPT: &str = "You are a Financial Assistant that helps with payment queries.

You can provide information about:
- Pending payments and overdue amounts
- Recent payment history
- Payment receipt status
- Payment processing simulations

Use the payment data provided to answer payment questions clearly and professionally.
Be helpful and provide actionable information about payment status.
Format your responses clearly and concisely.

When discussing payments:
- Monthly tuition is 600.00 per month
- Payments are due on the 1st of each month
- Overdue payments may incur late fees
- Receipt IDs are provided for completed payments

When discussing payment status:
- \"paid\" means all payments are current
- \"pending\" means payment is due soon
- \"overdue\" means payment is past due

When simulating receipt processing:
- Acknowledge receipt upload
- Provide mock confirmation with receipt ID
- Indicate successful processing";

pub struct PaymentQuestionsTool {
    binding: PersonaBinding,
    agent: SubAgent,
}

impl PaymentQuestionsTool {
    pub fn new(binding: PersonaBinding, agent: SubAgent) -> Self {
        Self { binding, agent }
    }
}

pub(crate) fn format_status(info: &PaymentInfo) -> String {
    let month = info.payment_month.as_deref().unwrap_or_default();
    let mut lines = Vec::new();
    match info.status {
        PaymentStatus::Paid => {
            lines.push("✓ All payments are current!".to_string());
            if let Some(receipt) = &info.receipt_id {
                lines.push(format!("  Last Receipt ID: {receipt}"));
            }
            lines.push(format!("  Amount Due: ${:.2}", info.amount_due));
        }
        PaymentStatus::Overdue => {
            lines.push("⚠️ OVERDUE PAYMENTS".to_string());
            lines.push(format!("  Unpaid Months: {}", info.unpaid_months.join(", ")));
            lines.push(format!("  Total Amount Due: ${:.2}", info.amount_due));
            lines.push(format!("  Monthly Rate: ${MONTHLY_TUITION:.2}"));
        }
        PaymentStatus::Pending => {
            lines.push("⏳ Payment Pending".to_string());
            lines.push(format!("  Amount Due: ${:.2}", info.amount_due));
            lines.push(format!("  Due Date: 1st of {month}"));
        }
    }
    lines.join("\n")
}

fn format_context(info: &PaymentInfo, persona: &str, query: &str) -> String {
    format!(
        "Payment Data for {} (ID: {}):\n[Requesting Persona: {persona}]\n\n\
         Payment Status: {}\nCurrent Month: {}\n\n{}\n\n\
         Payment Query: {query}\n",
        info.student_name.as_deref().unwrap_or("Unknown"),
        info.student_id,
        info.status.as_str().to_uppercase(),
        info.payment_month.as_deref().unwrap_or_default(),
        format_status(info),
    )
}

#[async_trait]
impl Tool for PaymentQuestionsTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Answers payment and financial questions: pending and overdue tuition, payment history, receipt status, and receipt processing. Available to all personas."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The payment-related question" },
                "student_id": { "type": "string", "description": "Student ID for personalized payment data" },
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

        let student_id = self.binding.subject_id(&arguments, "student_id");
        let info = mock_data::generate_payment(student_id.as_deref());
        let answer = self
            .agent
            .ask(NAME, SYSTEM_PROMPT, format_context(&info, persona.as_str(), query))
            .await?;
        Ok(with_data(answer, &info))
    }
}
