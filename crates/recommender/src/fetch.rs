//! Retry-governed HTTP fetching
//!
//! Every upstream call goes through [`RetryClient::get_json`]. Status codes are
//! sorted into three classes:
//!
//! | status | class     | behaviour                                   |
//! |--------|-----------|---------------------------------------------|
//! | 200    | Success   | body parsed as JSON and returned            |
//! | 429    | Retryable | wait `Retry-After` or a jittered backoff    |
//! | other  | Fatal     | logged and returned immediately             |
//!
//! Transport errors are retryable. Once attempts run out the last retryable
//! condition is returned as a [`FetchError`]; nothing here panics.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{FetchError, RecommenderError, Result};

/// How a response status is handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Retryable,
    Fatal,
}

/// Bounded retry with randomized waits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Lower bound of the randomized wait
    pub min_wait: Duration,

    /// Upper bound of the randomized wait
    pub max_wait: Duration,

    /// Longest `Retry-After` hint honored as-is; larger hints are clamped
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_wait: Duration::from_secs(10),
            max_wait: Duration::from_secs(20),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without sleeping
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            max_retry_after: Duration::ZERO,
        }
    }

    pub const fn classify(&self, status: StatusCode) -> StatusClass {
        match status.as_u16() {
            200 => StatusClass::Success,
            429 => StatusClass::Retryable,
            _ => StatusClass::Fatal,
        }
    }

    /// Uniformly random wait within `[min_wait, max_wait]`
    pub fn backoff(&self) -> Duration {
        let min = millis(self.min_wait);
        let max = millis(self.max_wait).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Wait before the next attempt after a 429; server hint wins up to `max_retry_after`
    pub fn rate_limit_wait(&self, headers: &HeaderMap) -> Duration {
        match retry_after(headers) {
            Some(hint) if hint > self.max_retry_after => {
                tracing::warn!(
                    hint_secs = hint.as_secs(),
                    cap_secs = self.max_retry_after.as_secs(),
                    "Retry-After exceeds cap, clamping"
                );
                self.max_retry_after
            }
            Some(hint) => hint,
            None => self.backoff(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(RecommenderError::Config("retry max_attempts must be at least 1".into()));
        }
        if self.min_wait > self.max_wait {
            return Err(RecommenderError::Config(format!(
                "retry min_wait ({:?}) exceeds max_wait ({:?})",
                self.min_wait, self.max_wait
            )));
        }
        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// `Retry-After` in delta-seconds form
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Build the `Authorization: Bearer ...` header set used by both upstreams
pub fn bearer_headers(token: &str) -> Result<HeaderMap> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| RecommenderError::Config("API key contains invalid header characters".into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// HTTP GET client applying a [`RetryPolicy`]
#[derive(Clone, Debug)]
pub struct RetryClient {
    http: Client,
    policy: RetryPolicy,
}

impl RetryClient {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Result<Self> {
        policy.validate()?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, policy })
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url` and return the parsed JSON body
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &HeaderMap,
    ) -> std::result::Result<Value, FetchError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = FetchError::RateLimited { attempts: 0 };

        for attempt in 1..=attempts {
            let sent = self
                .http
                .get(url)
                .query(query)
                .headers(headers.clone())
                .send()
                .await;

            let wait = match sent {
                Ok(response) => {
                    let status = response.status();
                    match self.policy.classify(status) {
                        StatusClass::Success => {
                            return response
                                .json::<Value>()
                                .await
                                .map_err(|e| FetchError::Decode(e.to_string()));
                        }
                        StatusClass::Retryable => {
                            let wait = self.policy.rate_limit_wait(response.headers());
                            tracing::warn!(
                                url,
                                attempt,
                                wait_ms = millis(wait),
                                "Rate limit hit, waiting before retrying"
                            );
                            last_error = FetchError::RateLimited { attempts: attempt };
                            wait
                        }
                        StatusClass::Fatal => {
                            let body = response.text().await.unwrap_or_default();
                            tracing::warn!(url, status = status.as_u16(), %body, "Upstream request failed");
                            return Err(FetchError::UpstreamFatal {
                                status: status.as_u16(),
                                body,
                            });
                        }
                    }
                }
                Err(e) => {
                    let wait = self.policy.backoff();
                    tracing::warn!(url, attempt, error = %e, "Upstream unreachable, waiting before retrying");
                    last_error = FetchError::Unreachable {
                        attempts: attempt,
                        message: e.to_string(),
                    };
                    wait
                }
            };

            if attempt < attempts {
                tokio::time::sleep(wait).await;
            }
        }

        tracing::warn!(url, attempts, error = %last_error, "Giving up on upstream request");
        Err(last_error)
    }
}
