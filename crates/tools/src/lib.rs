//! Tools available to the EduBridge orchestrator.
//!
//! The local set is five persona-scoped domain tools (each backed by a
//! single-shot specialist prompt over demonstration data) plus `retrieve`
//! for knowledge-base content. The remote set is whatever the tool gateway
//! advertises, fetched per invocation through [`remote::GatewayClient`].

pub mod access;
pub mod admin;
pub mod general;
pub mod jsonrpc;
pub mod knowledge_base;
pub mod mock_data;
pub mod payment;
pub mod remote;
pub mod send_message;
pub mod student;
pub mod sub_agent;
pub mod teacher;

use edubridge_core::error::ToolError;
use edubridge_core::persona::PersonaContext;
use edubridge_core::tool::{ToolRegistry, ToolResult};
use serde::Serialize;
use std::sync::Arc;

pub use access::{Access, PersonaBinding, access_for};
pub use knowledge_base::{HttpKnowledgeBase, KnowledgeSource, RetrieveTool, StaticKnowledgeBase};
pub use remote::{GatewayClient, GatewayToolset};
pub use send_message::SendMessageTool;
pub use sub_agent::SubAgent;

/// Names of the local tools, in registration order.
pub const LOCAL_TOOL_NAMES: [&str; 6] = [
    "answer_student_questions",
    "answer_teacher_questions",
    "answer_payment_questions",
    "answer_admin_questions",
    "answer_general_questions",
    "retrieve",
];

pub(crate) fn query_argument(arguments: &serde_json::Value) -> Result<&str, ToolError> {
    arguments["query"]
        .as_str()
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))
}

pub(crate) fn with_data(answer: String, data: &impl Serialize) -> ToolResult {
    ToolResult {
        data: serde_json::to_value(data).ok(),
        ..ToolResult::text(answer)
    }
}

/// Builds the local tool set for each request.
#[derive(Clone)]
pub struct LocalTools {
    agent: SubAgent,
    knowledge: Option<Arc<dyn KnowledgeSource>>,
    knowledge_top_k: usize,
}

impl LocalTools {
    pub fn new(agent: SubAgent) -> Self {
        Self {
            agent,
            knowledge: None,
            knowledge_top_k: 5,
        }
    }

    pub fn with_knowledge_base(mut self, source: Arc<dyn KnowledgeSource>, top_k: usize) -> Self {
        self.knowledge = Some(source);
        self.knowledge_top_k = top_k;
        self
    }

    /// A registry bound to the caller's resolved persona.
    pub fn registry(&self, ctx: &PersonaContext) -> ToolRegistry {
        let binding = PersonaBinding::from_context(ctx);
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(student::StudentQuestionsTool::new(binding.clone(), self.agent.clone())));
        registry.register(Box::new(teacher::TeacherQuestionsTool::new(binding.clone(), self.agent.clone())));
        registry.register(Box::new(payment::PaymentQuestionsTool::new(binding.clone(), self.agent.clone())));
        registry.register(Box::new(admin::AdminQuestionsTool::new(binding.clone(), self.agent.clone())));
        registry.register(Box::new(general::GeneralQuestionsTool::new(binding, self.agent.clone())));
        registry.register(Box::new(RetrieveTool::new(self.knowledge.clone(), self.knowledge_top_k)));
        registry
    }
}
