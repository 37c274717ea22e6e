//! Orchestration over HTTP, for a gateway that does not host the
//! orchestrator itself.
//!
//! `POST {url}` with the request as JSON and the session id in
//! `X-Session-Id`. The runtime answers with JSON or an event stream; stream
//! `data:` lines are joined with `\n`.

use async_trait::async_trait;
use edubridge_agent::{Orchestration, OrchestrationError, OrchestrationRequest, OrchestrationResponse};
use edubridge_core::persona::Persona;
use std::time::Duration;
use tracing::{debug, info};

pub const SESSION_HEADER: &str = "X-Session-Id";

pub struct RuntimeClient {
    url: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl RuntimeClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OrchestrationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrchestrationError::Configuration(format!("runtime HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            token: None,
        })
    }

    /// Present `Authorization: Bearer <token>` on every invocation.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Join the `data:` payloads of an event-stream body.
pub fn join_event_stream(body: &str) -> String {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runtimes may stream a JSON string literal; unwrap it when they do.
fn unquote(text: String) -> String {
    match serde_json::from_str::<String>(&text) {
        Ok(inner) => inner,
        Err(_) => text,
    }
}

/// Accepts a full response, a bare `{"result": ...}`, or a JSON string.
fn parse_json_reply(body: &str) -> Result<String, OrchestrationError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| OrchestrationError::Runtime(format!("malformed runtime response: {e}")))?;
    match value {
        serde_json::Value::String(text) => Ok(text),
        serde_json::Value::Object(ref map) => match map.get("result") {
            Some(serde_json::Value::String(text)) => Ok(text.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(OrchestrationError::Runtime("runtime response has no 'result'".into())),
        },
        other => Ok(other.to_string()),
    }
}

#[async_trait]
impl Orchestration for RuntimeClient {
    async fn invoke(
        &self,
        request: OrchestrationRequest,
        session_id: Option<&str>,
    ) -> Result<OrchestrationResponse, OrchestrationError> {
        let session_id = session_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OrchestrationError::Validation("Context must include 'session_id'".into()))?;
        let persona = request
            .persona
            .as_deref()
            .and_then(Persona::parse)
            .unwrap_or_default();

        info!(url = %self.url, session_id, "Invoking remote runtime");
        let mut builder = self
            .http
            .post(&self.url)
            .header(SESSION_HEADER, session_id)
            .header("Accept", "application/json, text/event-stream")
            .json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| OrchestrationError::Runtime(e.to_string()))?;

        let status = response.status();
        let streaming = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| OrchestrationError::Runtime(e.to_string()))?;

        if !status.is_success() {
            return Err(OrchestrationError::Runtime(format!("HTTP {}: {body}", status.as_u16())));
        }

        let result = if streaming {
            unquote(join_event_stream(&body))
        } else {
            parse_json_reply(&body)?
        };
        debug!(chars = result.chars().count(), streaming, "Runtime replied");

        Ok(OrchestrationResponse {
            result,
            session_id: session_id.to_string(),
            persona,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::{Json, Router, routing::post};
    use serde_json::{Value, json};

    async fn runtime(mode: &'static str) -> String {
        let app = Router::new().route(
            "/invocations",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                let session = headers
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let query = body["inputText"].as_str().unwrap_or_default().to_string();
                let auth = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
                if mode == "auth" && auth != Some("Bearer rt-token") {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                match mode {
                    "auth" => Json(json!({"result": "authorized"})).into_response(),
                    "json" => Json(json!({"result": format!("re: {query}"), "session_id": session, "persona": "student"}))
                        .into_response(),
                    "sse" => (
                        [(header::CONTENT_TYPE, "text/event-stream")],
                        "data: Linha um\n\ndata: Linha dois\n\n",
                    )
                        .into_response(),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/invocations")
    }

    fn request() -> OrchestrationRequest {
        OrchestrationRequest {
            input_text: Some("oi".into()),
            persona: Some("teacher".into()),
            user_id: Some("5511".into()),
            ..Default::default()
        }
    }

    const SESSION: &str = "whatsapp-5511999990000-2026-10-18-14-1a2b3c4d";

    #[tokio::test]
    async fn json_reply() {
        let client = RuntimeClient::new(runtime("json").await, Duration::from_secs(5)).unwrap();
        let response = client.invoke(request(), Some(SESSION)).await.unwrap();
        assert_eq!(response.result, "re: oi");
        assert_eq!(response.session_id, SESSION);
        assert_eq!(response.persona, Persona::Teacher);
    }

    #[tokio::test]
    async fn event_stream_reply_is_joined() {
        let client = RuntimeClient::new(runtime("sse").await, Duration::from_secs(5)).unwrap();
        let response = client.invoke(request(), Some(SESSION)).await.unwrap();
        assert_eq!(response.result, "Linha um\nLinha dois");
    }

    #[tokio::test]
    async fn error_status_is_runtime_error() {
        let client = RuntimeClient::new(runtime("fail").await, Duration::from_secs(5)).unwrap();
        let err = client.invoke(request(), Some(SESSION)).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Runtime(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn bearer_token_is_presented() {
        let url = runtime("auth").await;
        let anonymous = RuntimeClient::new(url.clone(), Duration::from_secs(5)).unwrap();
        let err = anonymous.invoke(request(), Some(SESSION)).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Runtime(ref m) if m.contains("401")));

        let client = RuntimeClient::new(url, Duration::from_secs(5))
            .unwrap()
            .with_bearer_token(Some("rt-token".into()));
        assert_eq!(client.invoke(request(), Some(SESSION)).await.unwrap().result, "authorized");
    }

    #[tokio::test]
    async fn session_id_required() {
        let client = RuntimeClient::new("http://127.0.0.1:9/invocations", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.invoke(request(), None).await,
            Err(OrchestrationError::Validation(_))
        ));
    }

    #[test]
    fn stream_joining() {
        assert_eq!(join_event_stream("event: x\ndata: a\n\ndata:b\n"), "a\nb");
        assert_eq!(unquote("\"Olá\\nmundo\"".into()), "Olá\nmundo");
        assert_eq!(unquote("plain".into()), "plain");
    }

    #[test]
    fn json_reply_shapes() {
        assert_eq!(parse_json_reply(r#""just text""#).unwrap(), "just text");
        assert_eq!(parse_json_reply(r#"{"result": "ok"}"#).unwrap(), "ok");
        assert!(parse_json_reply(r#"{"other": 1}"#).is_err());
    }
}
