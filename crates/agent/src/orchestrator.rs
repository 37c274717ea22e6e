//! The orchestration state machine.
//!
//! `received → persona_resolved → memory_bound → tools_assembled →
//! model_invoked → {responded | failed}`. Each transition is published on
//! the event bus. Everything that can be rejected is rejected before the
//! model is called.

use crate::loop_runner::TurnRunner;
use crate::prompt;
use async_trait::async_trait;
use chrono::Utc;
use edubridge_core::error::{MemoryError, ProviderError, ToolError};
use edubridge_core::event::{DomainEvent, EventBus, OrchestrationStage};
use edubridge_core::message::{Conversation, Message};
use edubridge_core::persona::{Persona, PersonaContext};
use edubridge_core::session::{SessionHandle, validate_session_id};
use edubridge_core::tool::{CapabilitySet, ToolCatalog};
use edubridge_memory::{MemoryBinding, MemoryIdResolver, MemorySession};
use edubridge_tools::{GatewayClient, LocalTools};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// The orchestration payload.
///
/// `inputText` wins over `prompt` when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    #[serde(rename = "inputText", default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_phone_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
}

impl OrchestrationRequest {
    pub fn query(&self) -> Option<&str> {
        non_empty(&self.input_text).or_else(|| non_empty(&self.prompt))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResponse {
    pub result: String,
    pub session_id: String,
    pub persona: Persona,
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Tools(#[from] ToolError),

    #[error(transparent)]
    Model(#[from] ProviderError),

    #[error("Remote runtime failed: {0}")]
    Runtime(String),
}

impl From<OrchestrationError> for edubridge_core::Error {
    fn from(e: OrchestrationError) -> Self {
        match e {
            OrchestrationError::Validation(msg) => edubridge_core::Error::Validation(msg),
            OrchestrationError::Configuration(message) => edubridge_core::Error::Config { message },
            OrchestrationError::Memory(e) => e.into(),
            OrchestrationError::Tools(e) => e.into(),
            OrchestrationError::Model(e) => e.into(),
            OrchestrationError::Runtime(msg) => edubridge_core::Error::Internal(msg),
        }
    }
}

/// Anything that can answer an orchestration request: the in-process
/// orchestrator, or a client for a remote one.
#[async_trait]
pub trait Orchestration: Send + Sync {
    async fn invoke(
        &self,
        request: OrchestrationRequest,
        session_id: Option<&str>,
    ) -> Result<OrchestrationResponse, OrchestrationError>;
}

struct ValidatedRequest {
    query: String,
    persona: Persona,
    user_id: String,
    persona_id: Option<String>,
    whatsapp_phone: Option<String>,
    memory_id: Option<String>,
    session_id: String,
}

fn validate(request: OrchestrationRequest, session_id: Option<&str>) -> Result<ValidatedRequest, OrchestrationError> {
    let query = request
        .query()
        .ok_or_else(|| OrchestrationError::Validation("Payload must include 'inputText' or 'prompt' parameter".into()))?
        .to_string();
    let persona = non_empty(&request.persona)
        .ok_or_else(|| {
            OrchestrationError::Validation(
                "Payload must include 'persona' parameter (student/teacher/administrator)".into(),
            )
        })?
        .parse::<Persona>()
        .map_err(OrchestrationError::Validation)?;
    let user_id = non_empty(&request.user_id)
        .ok_or_else(|| OrchestrationError::Validation("Payload must include 'user_id' parameter".into()))?
        .to_string();
    let session_id = session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OrchestrationError::Validation("Context must include 'session_id'".into()))?;
    validate_session_id(session_id).map_err(|e| OrchestrationError::Validation(e.to_string()))?;

    Ok(ValidatedRequest {
        query,
        persona,
        user_id,
        persona_id: non_empty(&request.persona_id).map(str::to_string),
        whatsapp_phone: non_empty(&request.whatsapp_phone_number).map(str::to_string),
        memory_id: non_empty(&request.memory_id).map(str::to_string),
        session_id: session_id.to_string(),
    })
}

/// The in-process orchestrator.
pub struct Orchestrator {
    runner: TurnRunner,
    memory_ids: MemoryIdResolver,
    memory: MemoryBinding,
    local_tools: LocalTools,
    gateway: Option<Arc<GatewayClient>>,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        runner: TurnRunner,
        memory_ids: MemoryIdResolver,
        memory: MemoryBinding,
        local_tools: LocalTools,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            runner,
            memory_ids,
            memory,
            local_tools,
            gateway: None,
            event_bus,
        }
    }

    /// Offer the gateway's catalog alongside the local tools.
    pub fn with_gateway(mut self, gateway: Arc<GatewayClient>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    fn enter(&self, session_id: &str, stage: OrchestrationStage) {
        info!(session_id, stage = %stage, "Orchestration stage");
        self.event_bus.publish(DomainEvent::StageEntered {
            session_id: session_id.to_string(),
            stage,
            timestamp: Utc::now(),
        });
    }

    fn fall_back(&self, session_id: &str, reason: String) {
        warn!(session_id, reason = %reason, "Falling back to local tools only");
        self.event_bus.publish(DomainEvent::CatalogFallback {
            session_id: session_id.to_string(),
            reason,
            timestamp: Utc::now(),
        });
    }

    /// The remote catalog for this invocation, or `None` after a fallback.
    async fn remote_toolset(&self, session_id: &str) -> Option<Arc<dyn CapabilitySet>> {
        let gateway = self.gateway.as_ref()?;
        match gateway.fetch_toolset().await {
            Ok(toolset) => Some(Arc::new(toolset)),
            Err(e) => {
                self.fall_back(session_id, e.to_string());
                None
            }
        }
    }

    async fn run_turn(
        &self,
        session_id: &str,
        system_prompt: &str,
        user_message: &str,
        catalog: &ToolCatalog,
    ) -> Result<String, ProviderError> {
        let mut conversation = Conversation::new(session_id);
        conversation.push(Message::user(user_message));
        self.runner.run(&mut conversation, system_prompt, catalog).await
    }

    async fn orchestrate(&self, request: ValidatedRequest) -> Result<OrchestrationResponse, OrchestrationError> {
        let sid = request.session_id.as_str();

        let mut ctx = PersonaContext::new(request.persona);
        if let Some(id) = &request.persona_id {
            ctx = ctx.with_id(id.clone());
        }
        self.enter(sid, OrchestrationStage::PersonaResolved);

        let memory_id = self.memory_ids.resolve(request.memory_id.as_deref()).await?;
        let memory = self.memory.bind(SessionHandle {
            session_id: request.session_id.clone(),
            actor_id: request.user_id.clone(),
            memory_id,
        })?;
        let recalled = memory.recall(&request.query).await;
        let memory_context = MemorySession::format_context(&recalled);
        self.enter(sid, OrchestrationStage::MemoryBound);

        let local: Arc<dyn CapabilitySet> = Arc::new(self.local_tools.registry(&ctx));
        let remote = self.remote_toolset(sid).await;
        self.enter(sid, OrchestrationStage::ToolsAssembled);

        let system_prompt = prompt::system_prompt(request.persona, request.persona_id.as_deref(), memory_context.as_deref());
        let user_message = prompt::contextualize(
            &request.query,
            request.persona,
            request.persona_id.as_deref(),
            request.whatsapp_phone.as_deref(),
        );
        let local_only = ToolCatalog::new().with(local.clone());

        self.enter(sid, OrchestrationStage::ModelInvoked);
        let reply = match remote {
            Some(remote) => {
                let union = ToolCatalog::new().with(local).with(remote);
                match self.run_turn(sid, &system_prompt, &user_message, &union).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        self.fall_back(sid, e.to_string());
                        self.run_turn(sid, &system_prompt, &user_message, &local_only).await?
                    }
                }
            }
            None => self.run_turn(sid, &system_prompt, &user_message, &local_only).await?,
        };

        memory.record(&request.query, &reply).await;

        Ok(OrchestrationResponse {
            result: reply,
            session_id: request.session_id,
            persona: request.persona,
        })
    }
}

#[async_trait]
impl Orchestration for Orchestrator {
    async fn invoke(
        &self,
        request: OrchestrationRequest,
        session_id: Option<&str>,
    ) -> Result<OrchestrationResponse, OrchestrationError> {
        let label = session_id.unwrap_or_default().to_string();
        self.enter(&label, OrchestrationStage::Received);

        let outcome = match validate(request, session_id) {
            Ok(request) => {
                info!(
                    session_id = %request.session_id,
                    persona = %request.persona,
                    user_id = %request.user_id,
                    "Orchestration request accepted"
                );
                self.orchestrate(request).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                self.enter(&response.session_id, OrchestrationStage::Responded);
                Ok(response)
            }
            Err(e) => {
                error!(session_id = %label, error = %e, "Orchestration failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "orchestration".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                self.enter(&label, OrchestrationStage::Failed);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loop_runner::testing::{ScriptedProvider, Step};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{Json, Router, routing::post};
    use edubridge_config::{MemoryConfig, StaticParameterStore};
    use edubridge_core::message::Role;
    use edubridge_core::provider::Provider;
    use edubridge_core::tool::{Tool, ToolRegistry, ToolResult};
    use edubridge_memory::InMemoryBackend;
    use edubridge_tools::SubAgent;
    use edubridge_tools::jsonrpc::{JsonRpcRequest, dispatch};
    use serde_json::json;
    use std::time::Duration;

    const SESSION: &str = "whatsapp-5511999990000-2026-10-18-14-1a2b3c4d";

    struct Harness {
        model: Arc<ScriptedProvider>,
        memory: Arc<InMemoryBackend>,
        events: tokio::sync::broadcast::Receiver<Arc<DomainEvent>>,
        orchestrator: Orchestrator,
    }

    fn harness(steps: Vec<Step>, memory_id: Option<&str>) -> Harness {
        let model = Arc::new(ScriptedProvider::new(steps));
        let sub_agents: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![]));
        let bus = Arc::new(EventBus::default());
        let events = bus.subscribe();
        let memory = Arc::new(InMemoryBackend::new("/edu"));

        let resolver = MemoryIdResolver::new(Arc::new(StaticParameterStore::default()), "/edubridge/memory_id", "MEMORY_ID")
            .with_cached(memory_id.map(str::to_string))
            .with_env(|_| None);
        let orchestrator = Orchestrator::new(
            TurnRunner::new(model.clone(), "orchestrator-model", 0.3, bus.clone()),
            resolver,
            MemoryBinding::new(memory.clone(), &MemoryConfig::default()),
            LocalTools::new(SubAgent::new(sub_agents, "sub-model", 0.3)),
            bus,
        );
        Harness {
            model,
            memory,
            events,
            orchestrator,
        }
    }

    fn request(query: &str, persona: &str) -> OrchestrationRequest {
        OrchestrationRequest {
            input_text: Some(query.into()),
            persona: Some(persona.into()),
            user_id: Some("5511999990000".into()),
            persona_id: Some("5511999990000".into()),
            whatsapp_phone_number: Some("+5511999990000".into()),
            ..Default::default()
        }
    }

    fn stages(events: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) -> Vec<OrchestrationStage> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::StageEntered { stage, .. } = event.as_ref() {
                out.push(*stage);
            }
        }
        out
    }

    fn fallbacks(events: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) -> usize {
        let mut n = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event.as_ref(), DomainEvent::CatalogFallback { .. }) {
                n += 1;
            }
        }
        n
    }

    #[tokio::test]
    async fn answers_and_walks_every_stage() {
        let mut h = harness(vec![Step::Text("Suas tarefas: Matemática")], Some("mem-1"));
        let response = h
            .orchestrator
            .invoke(request("Quais são minhas tarefas?", "student"), Some(SESSION))
            .await
            .unwrap();

        assert_eq!(response.result, "Suas tarefas: Matemática");
        assert_eq!(response.persona, Persona::Student);
        assert_eq!(response.session_id, SESSION);
        assert_eq!(
            stages(&mut h.events),
            vec![
                OrchestrationStage::Received,
                OrchestrationStage::PersonaResolved,
                OrchestrationStage::MemoryBound,
                OrchestrationStage::ToolsAssembled,
                OrchestrationStage::ModelInvoked,
                OrchestrationStage::Responded,
            ]
        );

        {
            let sent = &h.model.requests.lock().unwrap()[0];
            let user = sent.messages.iter().find(|m| m.role == Role::User).unwrap();
            assert!(user.content.starts_with("User Query: Quais são minhas tarefas?"));
            assert!(user.content.contains("WhatsApp Phone=+5511999990000"));
        }
        assert_eq!(h.model.tool_names(0), edubridge_tools::LOCAL_TOOL_NAMES.to_vec());

        assert_eq!(h.memory.count("mem-1").await, 2);
    }

    #[tokio::test]
    async fn missing_fields_fail_before_model() {
        let cases = [
            OrchestrationRequest {
                input_text: None,
                ..request("x", "student")
            },
            OrchestrationRequest {
                persona: None,
                ..request("x", "student")
            },
            OrchestrationRequest {
                user_id: Some(String::new()),
                ..request("x", "student")
            },
            request("x", "janitor"),
        ];
        for case in cases {
            let h = harness(vec![], Some("mem-1"));
            let err = h.orchestrator.invoke(case, Some(SESSION)).await.unwrap_err();
            assert!(matches!(err, OrchestrationError::Validation(_)), "{err}");
            assert_eq!(h.model.calls(), 0);
        }
    }

    #[tokio::test]
    async fn session_id_is_required_and_long_enough() {
        let h = harness(vec![], Some("mem-1"));
        for session in [None, Some(""), Some("short")] {
            let err = h.orchestrator.invoke(request("x", "student"), session).await.unwrap_err();
            assert!(matches!(err, OrchestrationError::Validation(_)));
        }
        assert_eq!(h.model.calls(), 0);
    }

    #[tokio::test]
    async fn prompt_alias_and_professor() {
        let h = harness(vec![Step::Text("ok")], Some("mem-1"));
        let req: OrchestrationRequest = serde_json::from_value(json!({
            "prompt": "Show my course metrics",
            "persona": "professor",
            "user_id": "u1"
        }))
        .unwrap();
        let response = h.orchestrator.invoke(req, Some(SESSION)).await.unwrap();
        assert_eq!(response.persona, Persona::Teacher);
    }

    #[tokio::test]
    async fn unresolved_memory_fails_before_model() {
        let mut h = harness(vec![Step::Text("never")], None);
        let err = h
            .orchestrator
            .invoke(request("oi", "student"), Some(SESSION))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Memory(MemoryError::Unresolved(_))));
        assert_eq!(h.model.calls(), 0);
        assert_eq!(stages(&mut h.events).last(), Some(&OrchestrationStage::Failed));
    }

    #[tokio::test]
    async fn malformed_memory_id_fails_fast() {
        let h = harness(vec![Step::Text("never")], Some("mem-1"));
        let req = OrchestrationRequest {
            memory_id: Some("bad id!".into()),
            ..request("oi", "student")
        };
        let err = h.orchestrator.invoke(req, Some(SESSION)).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Memory(MemoryError::InvalidMemoryId(_))));
        assert_eq!(h.model.calls(), 0);
    }

    #[tokio::test]
    async fn model_failure_records_nothing() {
        let h = harness(vec![Step::Fail], Some("mem-1"));
        let err = h
            .orchestrator
            .invoke(request("oi", "student"), Some(SESSION))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Model(_)));
        assert_eq!(h.model.calls(), 1);
        assert_eq!(h.memory.count("mem-1").await, 0);
    }

    #[tokio::test]
    async fn tool_calls_are_bound_to_request_persona() {
        let h = harness(
            vec![
                Step::Call("answer_admin_questions", json!({"query": "report", "persona": "administrator"})),
                Step::Text("Sorry, that report is for administrators."),
            ],
            Some("mem-1"),
        );
        h.orchestrator
            .invoke(request("Give me the operational report", "student"), Some(SESSION))
            .await
            .unwrap();
        let second = &h.model.requests.lock().unwrap()[1];
        let tool = second.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool.content.starts_with("Access denied"));
        assert!(tool.content.contains("Current persona: student"));
    }

    struct ScheduleTool;

    #[async_trait]
    impl Tool for ScheduleTool {
        fn name(&self) -> &str {
            "lookup_class_schedule"
        }
        fn description(&self) -> &str {
            "Class schedule for a student"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::text("Mon 08:00 Math"))
        }
    }

    async fn gateway() -> String {
        let registry = Arc::new({
            let mut r = ToolRegistry::new();
            r.register(Box::new(ScheduleTool));
            r
        });
        let app = Router::new().route(
            "/mcp",
            post(move |Json(req): Json<JsonRpcRequest>| {
                let registry = registry.clone();
                async move {
                    match dispatch(&registry, "test-gateway", req).await {
                        Some(resp) => Json(resp).into_response(),
                        None => StatusCode::ACCEPTED.into_response(),
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/mcp")
    }

    fn gateway_client(url: String) -> Arc<GatewayClient> {
        Arc::new(GatewayClient::new(url, Duration::from_secs(2), None).unwrap())
    }

    #[tokio::test]
    async fn remote_tools_join_local_set() {
        let mut h = harness(
            vec![Step::Call("lookup_class_schedule", json!({})), Step::Text("Math on Monday")],
            Some("mem-1"),
        );
        h.orchestrator = h.orchestrator.with_gateway(gateway_client(gateway().await));
        let response = h
            .orchestrator
            .invoke(request("When is math?", "student"), Some(SESSION))
            .await
            .unwrap();
        assert_eq!(response.result, "Math on Monday");

        let names = h.model.tool_names(0);
        assert_eq!(names.len(), 7);
        assert_eq!(names.last().map(String::as_str), Some("lookup_class_schedule"));
        let second = &h.model.requests.lock().unwrap()[1];
        assert_eq!(second.messages.last().unwrap().content, "Mon 08:00 Math");
        assert_eq!(fallbacks(&mut h.events), 0);
    }

    #[tokio::test]
    async fn unreachable_gateway_gives_one_local_attempt() {
        let mut h = harness(vec![Step::Text("local answer")], Some("mem-1"));
        h.orchestrator = h.orchestrator.with_gateway(gateway_client("http://127.0.0.1:9/mcp".into()));
        let response = h
            .orchestrator
            .invoke(request("oi", "student"), Some(SESSION))
            .await
            .unwrap();
        assert_eq!(response.result, "local answer");
        assert_eq!(h.model.calls(), 1);
        assert_eq!(h.model.tool_names(0).len(), 6);
        assert_eq!(fallbacks(&mut h.events), 1);
    }

    #[tokio::test]
    async fn failed_union_turn_retries_local_only_once() {
        let mut h = harness(vec![Step::Fail, Step::Text("recovered")], Some("mem-1"));
        h.orchestrator = h.orchestrator.with_gateway(gateway_client(gateway().await));
        let response = h
            .orchestrator
            .invoke(request("oi", "student"), Some(SESSION))
            .await
            .unwrap();
        assert_eq!(response.result, "recovered");
        assert_eq!(h.model.calls(), 2);
        assert_eq!(h.model.tool_names(0).len(), 7);
        assert_eq!(h.model.tool_names(1).len(), 6);
        assert_eq!(fallbacks(&mut h.events), 1);
    }

    #[tokio::test]
    async fn second_failure_is_surfaced() {
        let h = harness(vec![Step::Fail, Step::Fail, Step::Text("unused")], Some("mem-1"));
        let orchestrator = h.orchestrator.with_gateway(gateway_client(gateway().await));
        let err = orchestrator
            .invoke(request("oi", "student"), Some(SESSION))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Model(_)));
        assert_eq!(h.model.calls(), 2);
    }

    #[test]
    fn input_text_wins_over_prompt() {
        let req: OrchestrationRequest =
            serde_json::from_value(json!({"inputText": "a", "prompt": "b"})).unwrap();
        assert_eq!(req.query(), Some("a"));
        let req: OrchestrationRequest = serde_json::from_value(json!({"inputText": "", "prompt": "b"})).unwrap();
        assert_eq!(req.query(), Some("b"));
    }
}
