//! HTTP Client Abstraction
//!
//! The remote host connector talks JSON over this trait and the media mirror
//! uses it to pull preview assets. Status codes are never turned into errors
//! here; each caller owns its own mapping.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Outgoing request. Built with the chained setters below.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        let value = format!("Bearer {}", token.into());
        self.header("Authorization", value)
    }

    /// Serialize `payload` as the request body and mark it as JSON.
    pub fn json<T: Serialize>(self, payload: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(payload)
            .map_err(|e| BridgeError::OperationFailed(format!("cannot encode body: {}", e)))?;
        let mut request = self.header("Content-Type", "application/json");
        request.body = Some(Bytes::from(encoded));
        Ok(request)
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BridgeError::OperationFailed(format!("cannot decode body: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `429` and `5xx` are worth another attempt; everything else is final.
    pub fn is_retryable_status(&self) -> bool {
        self.status == 429 || self.status >= 500
    }

    /// Header lookup ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v.as_str()))
    }

    /// Media type of the body with any parameters dropped.
    pub fn content_type(&self) -> Option<&str> {
        let raw = self.header("content-type")?;
        let media_type = raw.split(';').next().unwrap_or_default().trim();
        (!media_type.is_empty()).then_some(media_type)
    }
}

/// How many times a transport-level request is tried and how long to wait
/// in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Double the delay after each failure when set; otherwise wait `base_delay`.
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// For callers that run their own retry loop on top of the client.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `failed + 1`, given `failed` attempts so far.
    pub fn delay_after(&self, failed: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(failed.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

/// Async HTTP client.
///
/// Non-2xx answers come back as `Ok(HttpResponse)`. Only transport failures
/// such as refused connections, TLS problems or timeouts are `Err`.
///
/// ```ignore
/// let request = HttpRequest::new(HttpMethod::Get, "https://host.example/api/folders")
///     .bearer_token(session.token());
/// let listing: serde_json::Value = client.execute(request).await?.json()?;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Like [`execute`](Self::execute) but with an explicit retry policy.
    /// The default ignores the policy.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        _policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.execute(request).await
    }
}
