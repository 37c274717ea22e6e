//! OAuth2 client-credentials tokens for the remote tool gateway.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use edubridge_core::error::DirectoryError;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const REFRESH_SKEW: Duration = Duration::from_secs(60);
const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const MAX_TTL: Duration = Duration::from_secs(24 * 3600);

/// A source of bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, DirectoryError>;
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl CachedToken {
    /// Refresh `REFRESH_SKEW` early, or halfway through lifetimes shorter
    /// than twice the skew. Never later than the server-stated expiry.
    fn new(value: String, ttl: Duration, now: Instant) -> Self {
        let ttl = ttl.min(MAX_TTL);
        let lead = REFRESH_SKEW.min(ttl / 2);
        let refresh_at = now.checked_add(ttl - lead).unwrap_or(now);
        Self { value, refresh_at }
    }

    fn is_valid(&self, now: Instant) -> bool {
        self.refresh_at > now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// `grant_type=client_credentials` against a token endpoint, with the
/// client id and secret sent as HTTP Basic credentials. The token is cached
/// until shortly before it expires.
pub struct ClientCredentialsTokenSource {
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
    client: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsTokenSource {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: Option<String>,
    ) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DirectoryError::TokenFailed(e.to_string()))?;
        Ok(Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope,
            client,
            cache: Mutex::new(None),
        })
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }

    async fn fetch(&self) -> Result<CachedToken, DirectoryError> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(scope) = &self.scope {
            form.push(("scope", scope.as_str()));
        }

        let response = self
            .client
            .post(&self.token_url)
            .header("Authorization", self.basic_auth())
            .form(&form)
            .send()
            .await
            .map_err(|e| DirectoryError::TokenFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::TokenFailed(format!("HTTP {status}: {body}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::TokenFailed(format!("malformed token response: {e}")))?;
        let ttl = body.expires_in.map(Duration::from_secs).unwrap_or(DEFAULT_TTL);
        debug!(ttl_secs = ttl.as_secs(), "Issued gateway access token");

        Ok(CachedToken::new(body.access_token, ttl, Instant::now()))
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsTokenSource {
    async fn token(&self) -> Result<String, DirectoryError> {
        let mut guard = self.cache.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.is_valid(Instant::now())
        {
            return Ok(cached.value.clone());
        }
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Form, Json, Router, http::HeaderMap, routing::post};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn token_server(expires_in: u64) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/oauth2/token",
            post(
                move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
                    let counter = counter.clone();
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        Json(json!({
                            "access_token": format!("tok-{n}"),
                            "expires_in": expires_in,
                            "echo_auth": auth,
                            "echo_grant": form.get("grant_type"),
                            "echo_scope": form.get("scope"),
                        }))
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/oauth2/token"), calls)
    }

    #[test]
    fn basic_auth_header() {
        let src = ClientCredentialsTokenSource::new("http://x", "id", "secret", None).unwrap();
        assert_eq!(src.basic_auth(), format!("Basic {}", STANDARD.encode("id:secret")));
    }

    #[tokio::test]
    async fn token_is_cached() {
        let (url, calls) = token_server(3600).await;
        let src =
            ClientCredentialsTokenSource::new(url, "id", "secret", Some("gateway/invoke".into()))
                .unwrap();
        assert_eq!(src.token().await.unwrap(), "tok-1");
        assert_eq!(src.token().await.unwrap(), "tok-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let (url, calls) = token_server(3600).await;
        let src = ClientCredentialsTokenSource::new(url, "id", "secret", None).unwrap();
        src.token().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        src.cache.lock().await.as_mut().unwrap().refresh_at = Instant::now();
        assert_eq!(src.token().await.unwrap(), "tok-2");
    }

    #[tokio::test]
    async fn zero_ttl_token_is_not_reused() {
        let (url, calls) = token_server(0).await;
        let src = ClientCredentialsTokenSource::new(url, "id", "secret", None).unwrap();
        assert_eq!(src.token().await.unwrap(), "tok-1");
        assert_eq!(src.token().await.unwrap(), "tok-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn huge_expires_in_is_capped() {
        let (url, calls) = token_server(u64::MAX).await;
        let src = ClientCredentialsTokenSource::new(url, "id", "secret", None).unwrap();
        assert_eq!(src.token().await.unwrap(), "tok-1");
        assert_eq!(src.token().await.unwrap(), "tok-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn short_ttl_refreshes_before_expiry() {
        let now = Instant::now();
        let token = CachedToken::new("t".into(), Duration::from_secs(30), now);
        assert_eq!(token.refresh_at, now + Duration::from_secs(15));
        assert!(token.is_valid(now + Duration::from_secs(14)));
        assert!(!token.is_valid(now + Duration::from_secs(30)));

        let long = CachedToken::new("t".into(), Duration::from_secs(3600), now);
        assert_eq!(long.refresh_at, now + Duration::from_secs(3540));
    }

    #[test]
    fn ttl_is_capped_at_a_day() {
        let now = Instant::now();
        let token = CachedToken::new("t".into(), Duration::from_secs(u64::MAX), now);
        assert_eq!(token.refresh_at, now + MAX_TTL - REFRESH_SKEW);
    }

    #[tokio::test]
    async fn failure_is_token_error() {
        let src = ClientCredentialsTokenSource::new("http://127.0.0.1:9/token", "id", "s", None)
            .unwrap();
        assert!(matches!(src.token().await, Err(DirectoryError::TokenFailed(_))));
    }

    #[test]
    fn token_response_parses() {
        let v: Value = json!({"access_token": "a", "token_type": "Bearer"});
        let parsed: TokenResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.access_token, "a");
        assert!(parsed.expires_in.is_none());
    }
}
