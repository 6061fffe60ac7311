//! Shared HTTP plumbing for the remote backends.
//!
//! Blocking client with a fixed per-call timeout, bearer auth, per-request
//! IDs, and bounded retry with exponential backoff plus jitter for transient
//! transport failures. HTTP-level errors (4xx) are not retried; the caller
//! treats them as per-record failures.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LocritError, Result};

use super::AuthSlot;

/// Retry configuration for remote calls.
#[derive(Debug, Clone)]
pub(crate) struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            jitter_factor: 0.25,
        }
    }
}

/// One backend's HTTP transport.
#[derive(Debug)]
pub(crate) struct HttpGateway {
    kind: &'static str,
    base_url: String,
    http: Client,
    auth: AuthSlot,
    retry: RetryConfig,
}

impl HttpGateway {
    pub(crate) fn new(kind: &'static str, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LocritError::backend(kind, format!("HTTP client error: {err}")))?;
        Ok(Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            auth: AuthSlot::default(),
            retry: RetryConfig::default(),
        })
    }

    pub(crate) fn set_auth_token(&self, token: Option<&str>) {
        self.auth.set(token);
    }

    /// Reachability check: any HTTP response counts, only a transport
    /// failure marks the backend unreachable.
    pub(crate) fn probe(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.http
            .get(&url)
            .send()
            .map_err(|err| self.transport_error("probe", &err))?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET returning the decoded body, or `None` on 404 / JSON null.
    pub(crate) fn get_json(&self, path: &str) -> Result<Option<Value>> {
        match self.request(Method::GET, path, None)? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(value)),
        }
    }

    /// Send a JSON body, returning the decoded response body (404 → error).
    pub(crate) fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        match self.request(method, path, Some(body))? {
            Some(value) => Ok(value),
            None => Err(LocritError::backend(
                self.kind,
                format!("{}: not found", self.url(path)),
            )),
        }
    }

    /// DELETE, reporting whether the target existed (404 → false).
    pub(crate) fn delete(&self, path: &str) -> Result<bool> {
        Ok(self.request(Method::DELETE, path, None)?.is_some())
    }

    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let url = self.url(path);
        let mut last_error = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                debug!(
                    backend = self.kind,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                );
                std::thread::sleep(delay);
            }

            match self.dispatch(method.clone(), &url, body) {
                Ok(outcome) => return Ok(outcome),
                Err(Retryable::No(err)) => return Err(err),
                Err(Retryable::Yes(err)) => {
                    warn!(backend = self.kind, attempt, error = %err, "request failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LocritError::backend(self.kind, "request failed with no attempts")))
    }

    fn dispatch(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> std::result::Result<Option<Value>, Retryable> {
        let request_id = short_request_id();
        debug!(backend = self.kind, %method, url, request_id = %request_id, "remote call");

        let mut builder = self
            .http
            .request(method, url)
            .header("X-Request-ID", &request_id);
        if let Some(token) = self.auth.bearer() {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|err| Retryable::Yes(self.transport_error(url, &err)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response.text().map_err(|err| {
            Retryable::Yes(LocritError::backend(
                self.kind,
                format!("read response from {url}: {err}"),
            ))
        })?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Some(Value::Null));
            }
            let value = serde_json::from_str(&text).map_err(|err| {
                Retryable::No(LocritError::backend(
                    self.kind,
                    format!("invalid JSON from {url}: {err}"),
                ))
            })?;
            return Ok(Some(value));
        }

        let err = LocritError::backend(self.kind, format!("{url} returned {status}: {text}"));
        if status.is_server_error() {
            Err(Retryable::Yes(err))
        } else {
            Err(Retryable::No(err))
        }
    }

    fn transport_error(&self, context: &str, err: &reqwest::Error) -> LocritError {
        if err.is_timeout() {
            LocritError::Timeout(format!("{} backend: {context}", self.kind))
        } else {
            LocritError::backend(self.kind, format!("{context}: {err}"))
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.base_delay_ms as f64;
        let exp_delay = base * 2_f64.powi(attempt as i32);
        let capped = exp_delay.min(self.retry.max_delay_ms as f64);
        let jitter_range = capped * self.retry.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        let final_delay = (capped + jitter).max(0.0);
        Duration::from_millis(final_delay as u64)
    }
}

fn short_request_id() -> String {
    format!(
        "lrs-{}",
        Uuid::new_v4().to_string().split('-').next().unwrap_or("0")
    )
}

enum Retryable {
    Yes(LocritError),
    No(LocritError),
}
