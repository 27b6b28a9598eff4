//! [`HttpClient`] backed by reqwest with rustls.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries transport failures and `429`/`5xx` answers according to the
/// [`RetryPolicy`] it is given. Any other status goes straight back.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("content-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client setup: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }

    fn prepare(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(limit) = request.timeout {
            builder = builder.timeout(limit);
        }
        builder
    }

    async fn collect(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("reading body: {}", e)))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn transport_error(error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::OperationFailed("request timed out".to_string())
        } else if error.is_connect() {
            BridgeError::OperationFailed(format!("connection failed: {}", error))
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut failed = 0;

        loop {
            debug!(
                method = request.method.as_str(),
                url = %request.url,
                attempt = failed + 1,
                "sending request"
            );

            let error = match self.prepare(&request).send().await {
                Ok(response) => {
                    let response = Self::collect(response).await?;
                    if !response.is_retryable_status() || failed + 1 >= max_attempts {
                        return Ok(response);
                    }
                    BridgeError::OperationFailed(format!("HTTP {}", response.status))
                }
                Err(e) => Self::transport_error(e),
            };

            failed += 1;
            if failed >= max_attempts {
                return Err(error);
            }

            let delay = policy.delay_after(failed);
            warn!(
                error = %error,
                attempt = failed,
                delay_ms = delay.as_millis() as u64,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
