//! The tool-calling turn loop.

use chrono::Utc;
use edubridge_config::ModelConfig;
use edubridge_core::error::ProviderError;
use edubridge_core::event::{DomainEvent, EventBus};
use edubridge_core::message::{Conversation, Message, Role};
use edubridge_core::provider::{self, Provider, ProviderRequest, ProviderResponse};
use edubridge_core::tool::{ToolCall, ToolCatalog};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Returned when the model keeps calling tools past the iteration bound.
pub const ITERATION_LIMIT_REPLY: &str =
    "I couldn't finish answering within the allowed number of steps. Please try rephrasing your question.";

/// Drives one model turn: call the model, run the tools it asks for, feed
/// the results back, until it answers in plain text.
pub struct TurnRunner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    stream: bool,
    event_bus: Arc<EventBus>,
}

impl TurnRunner {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_iterations: 10,
            stream: false,
            event_bus,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &ModelConfig, event_bus: Arc<EventBus>) -> Self {
        Self::new(provider, config.model_id.clone(), config.temperature, event_bus)
            .with_max_tokens(config.max_tokens)
            .with_max_iterations(config.max_tool_iterations)
            .with_streaming(config.stream)
    }

    /// Set the maximum number of tool call iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Request streamed output; the stream is drained before tools run.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_model(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if self.stream {
            let rx = self.provider.stream(request).await?;
            provider::drain_stream(rx, &self.model).await
        } else {
            self.provider.complete(request).await
        }
    }

    /// Run the conversation to a final text answer.
    ///
    /// Tool failures go back to the model as `Error: ...` results; only
    /// model failures abort the turn.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        system_prompt: &str,
        catalog: &ToolCatalog,
    ) -> Result<String, ProviderError> {
        info!(
            session_id = %conversation.session_id,
            messages = conversation.messages.len(),
            sources = ?catalog.sources(),
            "Running model turn"
        );

        match conversation.messages.first() {
            Some(first) if first.role == Role::System => {
                conversation.messages[0] = Message::system(system_prompt);
            }
            _ => conversation.messages.insert(0, Message::system(system_prompt)),
        }

        let tool_definitions = catalog.definitions();

        for iteration in 1..=self.max_iterations {
            debug!(session_id = %conversation.session_id, iteration, "Turn iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                stream: self.stream,
            };

            let response = self.call_model(request).await?;

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    session_id: conversation.session_id.clone(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            if response.message.tool_calls.is_empty() {
                let text = response.message.content.clone();
                conversation.push(response.message);
                return Ok(text);
            }

            let tool_calls = response.message.tool_calls.clone();
            debug!(tool_count = tool_calls.len(), "Executing tool calls");
            conversation.push(response.message);

            for tc in &tool_calls {
                let arguments = match serde_json::from_str(&tc.arguments) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Unparseable tool arguments");
                        serde_json::Value::Object(Default::default())
                    }
                };
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };

                let start = std::time::Instant::now();
                let result = catalog.invoke(&call).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                let content = match result {
                    Ok(tool_result) => {
                        self.event_bus.publish(DomainEvent::ToolExecuted {
                            tool_name: tc.name.clone(),
                            success: tool_result.success,
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        tool_result.output
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        self.event_bus.publish(DomainEvent::ToolExecuted {
                            tool_name: tc.name.clone(),
                            success: false,
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        format!("Error: {e}")
                    }
                };
                conversation.push(Message::tool_result(&tc.id, content));
            }
        }

        warn!(
            session_id = %conversation.session_id,
            iterations = self.max_iterations,
            "Max tool iterations reached"
        );
        Ok(ITERATION_LIMIT_REPLY.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use edubridge_core::message::MessageToolCall;
    use edubridge_core::provider::Usage;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub enum Step {
        Text(&'static str),
        Call(&'static str, serde_json::Value),
        Fail,
    }

    /// Replays a fixed script and records every request it sees.
    pub struct ScriptedProvider {
        steps: Mutex<VecDeque<Step>>,
        pub requests: Mutex<Vec<ProviderRequest>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn tool_names(&self, call: usize) -> Vec<String> {
            self.requests.lock().unwrap()[call]
                .tools
                .iter()
                .map(|t| t.name.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Step::Text("done"));
            let message = match step {
                Step::Text(text) => Message::assistant(text),
                Step::Call(name, args) => {
                    let mut msg = Message::assistant("");
                    msg.tool_calls = vec![MessageToolCall {
                        id: format!("call_{n}"),
                        name: name.into(),
                        arguments: args.to_string(),
                    }];
                    msg
                }
                Step::Fail => {
                    return Err(ProviderError::ApiError {
                        status_code: 500,
                        message: "upstream exploded".into(),
                    });
                }
            };
            Ok(ProviderResponse {
                message,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: request.model,
            })
        }
    }
}
