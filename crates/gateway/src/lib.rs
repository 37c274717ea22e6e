//! HTTP gateway for EduBridge.
//!
//! Routes:
//! - `GET  /health`
//! - `POST /invocations`: one orchestration turn, session id in `X-Session-Id`
//!   (bearer token)
//! - `POST /events`: a batch of queued WhatsApp notifications
//! - `GET  /webhook`, `POST /webhook`: direct WhatsApp Cloud API webhook
//! - `POST /mcp`: JSON-RPC host for the outbound `send_whatsapp_message` tool
//!   (bearer token)
//!
//! Built on Axum.

pub mod dedup;
pub mod pipeline;
pub mod runtime_client;
pub mod setup;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use edubridge_agent::{Orchestration, OrchestrationError, OrchestrationRequest};
use edubridge_channels::signature::SIGNATURE_HEADER;
use edubridge_channels::{EventBatch, WebhookPayload, verify_signature};
use edubridge_core::tool::ToolRegistry;
use edubridge_tools::jsonrpc::{self, JsonRpcRequest, JsonRpcResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

pub use pipeline::{BatchOutcome, InboundPipeline, PipelineError};
pub use runtime_client::RuntimeClient;
pub use setup::{GatewayError, state_from_config};

const MCP_SERVER_NAME: &str = "edubridge-outbound";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestration: Arc<dyn Orchestration>,
    pub pipeline: InboundPipeline,
    /// Served at `/mcp`
    pub outbound_tools: ToolRegistry,
    /// Expected `hub.verify_token` for webhook verification
    pub verify_token: Option<String>,
    /// When set, `POST /webhook` bodies must carry a valid signature
    pub app_secret: Option<String>,
    /// Accepted on `/invocations` and `/mcp`; empty rejects everything
    pub bearer_tokens: Vec<String>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/invocations", post(invocations_handler))
        .route("/mcp", post(mcp_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health_handler))
        .route("/events", post(events_handler))
        .route("/webhook", get(verify_handler).post(webhook_handler))
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: edubridge_config::AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(state_from_config(&config).await?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, runtime = %config.runtime.mode, "EduBridge gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn error_body(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "success": false, "error": message.to_string() }))).into_response()
}

/// Requires `Authorization: Bearer <token>` matching one of
/// `GatewayState::bearer_tokens`.
async fn require_bearer(State(state): State<SharedState>, req: axum::extract::Request, next: Next) -> Response {
    if state.bearer_tokens.is_empty() {
        warn!(path = %req.uri().path(), "No bearer tokens configured; refusing request");
        return error_body(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let given = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match given {
        Some(token) if state.bearer_tokens.iter().any(|t| t == token) => next.run(req).await,
        _ => {
            warn!(path = %req.uri().path(), "Missing or invalid bearer token");
            error_body(StatusCode::UNAUTHORIZED, "unauthorized")
        }
    }
}

async fn invocations_handler(State(state): State<SharedState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: OrchestrationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")),
    };
    let session_id = headers
        .get(runtime_client::SESSION_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.orchestration.invoke(request, session_id).await {
        Ok(response) => Json(response).into_response(),
        Err(e @ OrchestrationError::Validation(_)) => error_body(StatusCode::BAD_REQUEST, e),
        Err(e) => {
            error!(error = %e, "Invocation failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

fn batch_response(result: Result<BatchOutcome, PipelineError>) -> Response {
    match result {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            error!(error = %e, "Inbound processing failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn events_handler(State(state): State<SharedState>, body: Bytes) -> Response {
    let batch = match EventBatch::from_json(&body) {
        Ok(batch) => batch,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, e),
    };
    batch_response(state.pipeline.process_batch(&batch).await)
}

#[derive(Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_handler(State(state): State<SharedState>, Query(query): Query<VerifyQuery>) -> Response {
    let expected = state.verify_token.as_deref();
    let subscribed = query.mode.as_deref() == Some("subscribe");
    match (expected, query.verify_token.as_deref(), query.challenge) {
        (Some(expected), Some(given), Some(challenge)) if subscribed && expected == given => {
            info!("Webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            warn!("Webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

async fn webhook_handler(State(state): State<SharedState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = state.app_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!("Webhook signature mismatch");
            return error_body(StatusCode::UNAUTHORIZED, "invalid signature");
        }
    }
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")),
    };
    batch_response(state.pipeline.process_webhook(&payload).await)
}

async fn mcp_handler(State(state): State<SharedState>, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let failure = JsonRpcResponse::failure(Value::Null, jsonrpc::PARSE_ERROR, e.to_string());
            return (StatusCode::BAD_REQUEST, Json(failure)).into_response();
        }
    };
    match jsonrpc::dispatch(&state.outbound_tools, MCP_SERVER_NAME, request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
