//! Remote host API connector
//!
//! Implements the `RemoteHost` trait over the host's JSON API.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::remote::{RemoteEntry, RemoteFileInfo, RemoteHost, Session};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::RemoteHostError;
use crate::types::{extract_token, normalize_file_info, normalize_listing, LoginRequest};

/// Request timeout for API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on listing pages followed for a single folder
const MAX_LISTING_PAGES: usize = 100;

/// Remote host API connector
///
/// # Example
///
/// ```ignore
/// use provider_remote_host::RemoteHostConnector;
/// use bridge_traits::remote::RemoteHost;
///
/// let connector = RemoteHostConnector::new(http_client, "https://host.example", "user", "pass");
/// let session = connector.login().await?;
/// let entries = connector.list_folder(&session, Some("abc123")).await?;
/// ```
pub struct RemoteHostConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    username: String,
    password: String,
    retry_policy: RetryPolicy,
}

impl RemoteHostConnector {
    /// Create a new connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `base_url` - Host origin, e.g. `https://host.example`
    /// * `username` / `password` - Account credentials used by `login`
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the transport retry policy for listing and detail calls.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn folders_url(&self, slug: Option<&str>, cursor: Option<&str>) -> String {
        let mut url = match slug {
            Some(slug) => format!(
                "{}/api/folders/{}",
                self.base_url,
                urlencoding::encode(slug)
            ),
            None => format!("{}/api/folders", self.base_url),
        };
        if let Some(cursor) = cursor {
            url.push_str("?cursor=");
            url.push_str(&urlencoding::encode(cursor));
        }
        url
    }

    fn file_url(&self, slug: &str) -> String {
        format!("{}/api/files/{}", self.base_url, urlencoding::encode(slug))
    }

    /// Send a request and map the status onto the provider error taxonomy.
    ///
    /// `subject` names the slug the call is about, used for `NotFound`.
    async fn send(
        &self,
        request: HttpRequest,
        subject: &str,
    ) -> std::result::Result<Value, RemoteHostError> {
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        Self::check_status(&response, subject)?;

        response
            .json::<Value>()
            .map_err(|e| RemoteHostError::ParseError(e.to_string()))
    }

    fn check_status(
        response: &HttpResponse,
        subject: &str,
    ) -> std::result::Result<(), RemoteHostError> {
        if response.is_success() {
            return Ok(());
        }

        let message = String::from_utf8_lossy(&response.body)
            .chars()
            .take(200)
            .collect::<String>();

        match response.status {
            401 | 403 => Err(RemoteHostError::AuthenticationFailed(format!(
                "status {}: {}",
                response.status, message
            ))),
            404 => Err(RemoteHostError::NotFound {
                slug: subject.to_string(),
            }),
            status_code => Err(RemoteHostError::ApiError {
                status_code,
                message,
            }),
        }
    }

    async fn login_inner(&self) -> std::result::Result<Session, RemoteHostError> {
        let url = format!("{}/api/login", self.base_url);
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })?;

        // Login is not retried: a rejected password will not improve.
        let response = self.http_client.execute(request).await?;
        Self::check_status(&response, "login")?;

        let payload = response
            .json::<Value>()
            .map_err(|e| RemoteHostError::ParseError(e.to_string()))?;

        extract_token(&payload).map(Session::new).ok_or_else(|| {
            RemoteHostError::AuthenticationFailed("login response carried no token".to_string())
        })
    }

    async fn list_folder_inner(
        &self,
        session: &Session,
        slug: Option<&str>,
    ) -> std::result::Result<Vec<RemoteEntry>, RemoteHostError> {
        let subject = slug.unwrap_or("<root>");
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        for page_index in 0..MAX_LISTING_PAGES {
            let request = HttpRequest::new(
                HttpMethod::Get,
                self.folders_url(slug, cursor.as_deref()),
            )
            .bearer_token(session.token())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

            let payload = self.send(request, subject).await?;
            let page = normalize_listing(&payload)?;
            debug!(
                page = page_index,
                count = page.entries.len(),
                "Fetched listing page"
            );
            entries.extend(page.entries);

            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => return Ok(entries),
            }
        }

        warn!(
            folder = subject,
            pages = MAX_LISTING_PAGES,
            "Listing page limit reached, returning partial folder"
        );
        Ok(entries)
    }

    async fn get_file_detail_inner(
        &self,
        session: &Session,
        slug: &str,
    ) -> std::result::Result<RemoteFileInfo, RemoteHostError> {
        let request = HttpRequest::new(HttpMethod::Get, self.file_url(slug))
            .bearer_token(session.token())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let payload = self.send(request, slug).await?;
        normalize_file_info(&payload, &self.base_url)
    }
}

#[async_trait]
impl RemoteHost for RemoteHostConnector {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn login(&self) -> Result<Session> {
        let session = self.login_inner().await?;
        info!("Logged in to remote host");
        Ok(session)
    }

    #[instrument(skip(self, session))]
    async fn list_folder(&self, session: &Session, slug: Option<&str>) -> Result<Vec<RemoteEntry>> {
        let entries = self.list_folder_inner(session, slug).await?;
        debug!(count = entries.len(), "Listed folder");
        Ok(entries)
    }

    #[instrument(skip(self, session))]
    async fn get_file_detail(&self, session: &Session, slug: &str) -> Result<RemoteFileInfo> {
        Ok(self.get_file_detail_inner(session, slug).await?)
    }
}
