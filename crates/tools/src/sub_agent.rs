//! Single-shot model calls behind the domain tools.

use edubridge_config::ModelConfig;
use edubridge_core::error::ToolError;
use edubridge_core::message::Message;
use edubridge_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::debug;

/// A specialist prompt answered by one completion, no tools.
#[derive(Clone)]
pub struct SubAgent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl SubAgent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &ModelConfig) -> Self {
        Self {
            max_tokens: Some(config.max_tokens),
            ..Self::new(provider, config.model_id.clone(), config.sub_agent_temperature)
        }
    }

    pub async fn ask(&self, tool_name: &str, system_prompt: &str, context: String) -> Result<String, ToolError> {
        let mut request = ProviderRequest::simple(
            self.model.clone(),
            vec![Message::system(system_prompt), Message::user(context)],
            self.temperature,
        );
        request.max_tokens = self.max_tokens;

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(tool = tool_name, model = %response.model, "Sub-agent answered");
        Ok(response.message.content.trim().to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use edubridge_core::error::ProviderError;
    use edubridge_core::message::Message;
    use edubridge_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use std::sync::Mutex;

    /// Echoes the user message back and remembers every request.
    #[derive(Default)]
    pub struct EchoProvider {
        pub requests: Mutex<Vec<ProviderRequest>>,
    }

    impl EchoProvider {
        pub fn last_user_message(&self) -> String {
            self.requests
                .lock()
                .unwrap()
                .last()
                .and_then(|r| r.messages.last())
                .map(|m| m.content.clone())
                .unwrap_or_default()
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let reply = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant(reply),
                usage: None,
                model,
            })
        }
    }

    pub struct DownProvider;

    #[async_trait]
    impl Provider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{DownProvider, EchoProvider};
    use super::*;
    use edubridge_core::message::Role;

    #[tokio::test]
    async fn sends_system_and_context() {
        let provider = Arc::new(EchoProvider::default());
        let agent = SubAgent::new(provider.clone(), "openai/gpt-oss-20b", 0.3);
        let answer = agent.ask("t", "You are helpful.", "  ctx  ".into()).await.unwrap();
        assert_eq!(answer, "ctx");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].model, "openai/gpt-oss-20b");
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_execution_error() {
        let agent = SubAgent::new(Arc::new(DownProvider), "m", 0.3);
        let err = agent.ask("answer_general_questions", "s", "c".into()).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { ref tool_name, .. } if tool_name == "answer_general_questions"));
    }
}
