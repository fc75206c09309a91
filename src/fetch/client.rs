//! HTTP GET with an injected [`RetryPolicy`].

use super::retry::RetryPolicy;
use super::FetchError;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// `reqwest` client that only hands back `200 OK` responses.
///
/// Timeouts, connection failures and 5xx responses are retried according to
/// the policy. Any other non-200 status fails immediately.
#[derive(Debug, Clone)]
pub struct RetryClient {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryClient {
    pub fn new(http: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    /// Builds a client with a per-request timeout and the crate's user agent.
    pub fn with_timeout(timeout: Duration, policy: RetryPolicy) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Transport {
                url: String::new(),
                source,
            })?;
        Ok(Self::new(http, policy))
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut attempt = 1;

        loop {
            let reason = match self.http.get(url).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    debug!(url, attempt, "GET succeeded");
                    return Ok(response);
                }
                Ok(response) if self.policy.retries_status(response.status()) => {
                    format!("HTTP {}", response.status())
                }
                Ok(response) => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status(),
                    });
                }
                Err(e) if self.policy.retries_error(&e) => e.to_string(),
                Err(source) => {
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            };

            if !self.policy.has_attempts_left(attempt) {
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: reason,
                });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(url, attempt, delay_ms = delay.as_millis() as u64, %reason, "Retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
