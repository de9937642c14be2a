//! Remote chat-completion client (SiliconFlow-compatible wire format).

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionProvider, CompletionRequest, ProviderMode};
use crate::error::{truncate, CompletionError};

/// Retries after the first attempt, for transport failures only.
const MAX_RETRIES: u32 = 3;
const BASE_RETRY_DELAY: Duration = Duration::from_millis(1000);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const TOP_K: u32 = 50;
const FREQUENCY_PENALTY: f32 = 0.5;
const MIN_P: f32 = 0.05;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    frequency_penalty: f32,
    min_p: f32,
    enable_thinking: bool,
    thinking_budget: u32,
    stream: bool,
    n: u32,
    stop: Vec<String>,
}

/// Outcome of a failed attempt: transport failures may be retried.
enum AttemptError {
    Transport(String),
    Final(CompletionError),
}

pub struct RemoteProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_retries: u32,
    base_delay: Duration,
}

impl RemoteProvider {
    pub fn new(api_key: &str, api_url: &str, model: &str) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CompletionError::Other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_url: api_url.to_string(),
            model: model.to_string(),
            max_retries: MAX_RETRIES,
            base_delay: BASE_RETRY_DELAY,
        })
    }

    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn payload<'a>(&'a self, request: &'a CompletionRequest) -> ChatPayload<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        ChatPayload {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: TOP_K,
            frequency_penalty: FREQUENCY_PENALTY,
            min_p: MIN_P,
            enable_thinking: request.enable_thinking,
            thinking_budget: request.thinking_budget,
            stream: false,
            n: 1,
            stop: Vec::new(),
        }
    }

    async fn send_once(&self, payload: &ChatPayload<'_>) -> Result<String, AttemptError> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AttemptError::Final(CompletionError::Http {
                status,
                body: truncate(&body, 500),
            }));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AttemptError::Final(CompletionError::Parse(e.to_string())))?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AttemptError::Final(CompletionError::Parse("response has no message content".into())))?;
        Ok(content.to_string())
    }
}

#[async_trait]
impl CompletionProvider for RemoteProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Remote
    }

    fn name(&self) -> &str {
        "siliconflow"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let payload = self.payload(request);
        let mut attempt = 0;
        loop {
            match self.send_once(&payload).await {
                Ok(content) => {
                    debug!(chars = content.chars().count(), attempt, "Completion received");
                    return Ok(content);
                }
                Err(AttemptError::Final(err)) => {
                    warn!(status = ?err.status(), "Completion failed: {}", err);
                    return Err(err);
                }
                Err(AttemptError::Transport(transport)) if attempt < self.max_retries => {
                    let delay = self.base_delay * 2u32.pow(attempt);
                    warn!(attempt, ?delay, "Transport error, retrying: {}", transport);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AttemptError::Transport(transport)) => {
                    return Err(CompletionError::Network(transport));
                }
            }
        }
    }

    /// Lists models when the URL has the usual `/chat/completions`
    /// suffix, otherwise sends a one-token completion.
    async fn health_check(&self) -> Result<(), CompletionError> {
        let Some(base) = self.api_url.strip_suffix("/chat/completions") else {
            let probe = CompletionRequest::recommendation("ping").with_max_tokens(1).without_thinking();
            return self.complete(&probe).await.map(|_| ());
        };
        let resp = self
            .client
            .get(format!("{}/models", base))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(CompletionError::Http {
                status,
                body: truncate(&body, 200),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn provider(url: &str) -> RemoteProvider {
        RemoteProvider::new("sk-test", url, "test-model")
            .unwrap()
            .with_retry_policy(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_sends_payload_and_trims_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["top_k"], 50);
                assert_eq!(body["n"], 1);
                assert_eq!(body["stream"], false);
                assert_eq!(body["max_tokens"], 150);
                assert_eq!(body["messages"][0]["role"], "user");
                assert!(body["stop"].as_array().unwrap().is_empty());
                Json(json!({"choices": [{"message": {"content": "  pareto-principle, red-team \n"}}]}))
            }),
        );
        let url = spawn_stub(router).await;
        let out = provider(&url)
            .complete(&CompletionRequest::recommendation("pick"))
            .await
            .unwrap();
        assert_eq!(out, "pareto-principle, red-team");
    }

    #[tokio::test]
    async fn test_http_errors_are_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::TOO_MANY_REQUESTS, "slow down")
                }
            }),
        );
        let url = spawn_stub(router).await;
        let err = provider(&url)
            .complete(&CompletionRequest::recommendation("pick"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.kind(), FailureKind::RateLimit);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_content_is_parse_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let url = spawn_stub(router).await;
        let err = provider(&url)
            .complete(&CompletionRequest::recommendation("pick"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_becomes_network_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = provider(&format!("http://{}/v1/chat/completions", addr))
            .complete(&CompletionRequest::recommendation("pick"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Network);
    }

    /// Listener that accepts and immediately closes `drops` connections
    /// (all of them when `None`), then serves `router`.
    async fn spawn_flaky(drops: Option<usize>, router: Router) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            loop {
                if drops.is_some_and(|n| counter.load(Ordering::SeqCst) >= n) {
                    break;
                }
                let (socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/v1/chat/completions", addr), accepted)
    }

    #[tokio::test]
    async fn test_transport_errors_use_full_retry_budget() {
        let (url, accepted) = spawn_flaky(None, Router::new()).await;
        let err = RemoteProvider::new("sk-test", &url, "test-model")
            .unwrap()
            .with_retry_policy(3, Duration::from_millis(1))
            .complete(&CompletionRequest::recommendation("pick"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Network);
        assert_eq!(accepted.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transport_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": [{"message": {"content": "red-team"}}]})) }),
        );
        let (url, accepted) = spawn_flaky(Some(1), router).await;
        let out = provider(&url)
            .complete(&CompletionRequest::recommendation("pick"))
            .await
            .unwrap();
        assert_eq!(out, "red-team");
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_health_check_lists_models() {
        let router = Router::new()
            .route("/v1/models", get(|| async { Json(json!({"data": []})) }));
        let url = spawn_stub(router).await;
        assert!(provider(&url).health_check().await.is_ok());

        let router = Router::new().route(
            "/v1/models",
            get(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let url = spawn_stub(router).await;
        let err = provider(&url).health_check().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
