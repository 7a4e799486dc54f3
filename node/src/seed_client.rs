//! # Seed Request Client
//!
//! Asks the provisioning service for a secret sealed to our public key.
//!
//! This is the one place in Keyward that retries. Connection failures and
//! 5xx responses are retried with exponential backoff (1s, 2s, 4s, ...);
//! anything else, including a well-formed refusal from the service, is
//! final on the first attempt.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Body of the provisioning request.
#[derive(Debug, Clone, Serialize)]
pub struct SeedRequest {
    pub student_id: String,
    pub github_repo_url: String,
    /// PEM-encoded public key the seed will be sealed to.
    pub public_key: String,
}

#[derive(Debug, Deserialize)]
struct SeedResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    encrypted_seed: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Upper bound on attempts, whatever the caller asks for.
pub const MAX_ATTEMPTS: u32 = 10;

/// Delay before retry number `attempt + 1`: `base * 2^attempt`, saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
}

enum AttemptError {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

pub struct SeedClient {
    client: reqwest::Client,
    endpoint: String,
    max_attempts: u32,
    base_delay: Duration,
}

impl SeedClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        })
    }

    /// Total attempts, including the first. Clamped to `1..=MAX_ATTEMPTS`.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS);
        self
    }

    /// First backoff delay; doubles on every retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Request a sealed seed. Returns the base64 ciphertext.
    pub async fn request(&self, request: &SeedRequest) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            match self.request_once(request).await {
                Ok(seed) => return Ok(seed),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(e)) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "seed request failed"
                    );
                    last_error = Some(e);

                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(backoff_delay(self.base_delay, attempt)).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("no attempts made"))
            .context(format!("seed request failed after {} attempts", self.max_attempts)))
    }

    async fn request_once(&self, request: &SeedRequest) -> Result<String, AttemptError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(anyhow!("connection failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError::Transient(anyhow!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Fatal(anyhow!("HTTP {status}: {body}")));
        }

        let body: SeedResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(anyhow!("unreadable response body: {e}")))?;

        match (body.status.as_deref(), body.encrypted_seed) {
            (Some("success"), Some(seed)) if !seed.trim().is_empty() => Ok(seed.trim().to_string()),
            (status, _) => Err(AttemptError::Fatal(anyhow!(
                "provisioning service refused: status={} error={}",
                status.unwrap_or("<none>"),
                body.error.as_deref().unwrap_or("<none>")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Serves `router` on an ephemeral port and returns its URL.
    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn request() -> SeedRequest {
        SeedRequest {
            student_id: "S-001".into(),
            github_repo_url: "https://github.com/example/keyward".into(),
            public_key: "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----\n".into(),
        }
    }

    /// Fails with `failure` for the first `failures` calls, then succeeds.
    fn flaky(failures: u32, failure: StatusCode) -> (Router, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/",
                post(
                    move |State(calls): State<Arc<AtomicU32>>,
                          Json(body): Json<serde_json::Value>| async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(body["student_id"], "S-001");
                        if n < failures {
                            return (failure, Json(serde_json::json!({ "error": "busy" })));
                        }
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({
                                "status": "success",
                                "encrypted_seed": "QUJDRA==\n",
                            })),
                        )
                    },
                ),
            )
            .with_state(Arc::clone(&calls));
        (router, calls)
    }

    fn client(url: String, attempts: u32) -> SeedClient {
        SeedClient::new(url)
            .unwrap()
            .max_attempts(attempts)
            .base_delay(Duration::from_millis(5))
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 40), base * u32::MAX);
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[test]
    fn attempts_are_clamped() {
        let client = SeedClient::new("http://127.0.0.1:1/").unwrap();
        assert_eq!(client.max_attempts(0).max_attempts, 1);
        let client = SeedClient::new("http://127.0.0.1:1/").unwrap();
        assert_eq!(client.max_attempts(1_000).max_attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn first_try_success() {
        let (router, calls) = flaky(0, StatusCode::SERVICE_UNAVAILABLE);
        let url = spawn(router).await;
        let seed = client(url, 3).request(&request()).await.unwrap();
        assert_eq!(seed, "QUJDRA==");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let (router, calls) = flaky(2, StatusCode::BAD_GATEWAY);
        let url = spawn(router).await;
        let seed = client(url, 3).request(&request()).await.unwrap();
        assert_eq!(seed, "QUJDRA==");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (router, calls) = flaky(10, StatusCode::SERVICE_UNAVAILABLE);
        let url = spawn(router).await;
        let err = client(url, 3).request(&request()).await.unwrap_err();
        assert!(format!("{err:#}").contains("after 3 attempts"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (router, calls) = flaky(10, StatusCode::BAD_REQUEST);
        let url = spawn(router).await;
        assert!(client(url, 3).request(&request()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refusal_body_is_fatal() {
        let router = Router::new().route(
            "/",
            post(|| async {
                Json(serde_json::json!({ "status": "error", "error": "unknown student" }))
            }),
        );
        let url = spawn(router).await;
        let err = client(url, 3).request(&request()).await.unwrap_err();
        assert!(err.to_string().contains("unknown student"));
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_reported() {
        // Bind and drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}/"), 2)
            .request(&request())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("connection failed"));
    }
}
