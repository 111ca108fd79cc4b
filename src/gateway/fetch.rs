// src/gateway/fetch.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::gateway::{
    FetchError, RetryPolicy,
    transport::{HttpRequest, HttpResponse, Transport},
};

/// Query parameter that makes every GET unique.
pub const CACHE_BUST_PARAM: &str = "_t";

/// Retry-capable gateway to the exams API.
///
/// * 2xx/3xx return immediately, 4xx fail immediately.
/// * Timeouts, unreachable hosts and 5xx are retried per [`RetryPolicy`].
/// * After the last attempt the last error is returned.
/// * Every GET attempt carries a unique `_t` parameter.
pub struct FetchGateway {
    base_url: Url,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    sequence: AtomicU64,
}

impl FetchGateway {
    pub fn new(base_url: Url, transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            base_url,
            transport,
            policy,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<HttpResponse, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self.build_request(method.clone(), path, body.clone())?;
            debug!("{} {} (attempt {})", method, request.url, attempt);

            let error = match self.transport.send(request).await {
                Ok(response) => match response.status {
                    500.. => FetchError::Server {
                        status: response.status,
                        body: response.body,
                    },
                    400..=499 => {
                        warn!("{} {} rejected with {}", method, path, response.status);
                        return Err(FetchError::Client {
                            status: response.status,
                            body: response.body,
                        });
                    }
                    _ => return Ok(response),
                },
                Err(e) => e,
            };

            if !self.policy.should_retry(attempt, &error) {
                if error.is_retryable() {
                    warn!(
                        "{} {} failed after {} attempts: {}",
                        method, path, attempt, error
                    );
                }
                return Err(error);
            }

            let delay = self.policy.delay(attempt);
            warn!(
                "{} {} failed ({}), retrying in {:?} ({}/{})",
                method, path, error, delay, attempt, self.policy.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let response = self.request(Method::GET, path, None).await?;
        serde_json::from_str(&response.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    pub async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse, FetchError> {
        let body = serde_json::to_value(body).map_err(|e| FetchError::Transport(e.to_string()))?;
        self.request(Method::POST, path, Some(body)).await
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<HttpRequest, FetchError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| FetchError::Transport(e.to_string()))?;

        if method == Method::GET {
            url.query_pairs_mut()
                .append_pair(CACHE_BUST_PARAM, &self.cache_buster());
        }

        Ok(HttpRequest { method, url, body })
    }

    /// Millisecond timestamp plus a per-gateway sequence, unique even within one millisecond.
    fn cache_buster(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", Utc::now().timestamp_millis(), seq)
    }
}
