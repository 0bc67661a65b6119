//! HTTP client trait and implementations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{FetchError, UrlError};

use super::rate_limiter::RateLimiter;

/// Trait for page fetchers, enabling mockability in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch a page as text. Non-success statuses are errors.
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError>;
}

/// Configuration for [`FetchClient`].
#[derive(Clone, Debug)]
pub struct FetchClientBuilder {
    rate_limit: Duration,
    timeout: Duration,
    user_agent: String,
}

impl Default for FetchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClientBuilder {
    pub fn new() -> Self {
        Self {
            rate_limit: Duration::from_millis(200),
            timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (compatible; Souschef/0.1)".to_string(),
        }
    }

    /// Minimum delay between requests to the same host. Zero disables limiting.
    pub fn rate_limit(mut self, delay: Duration) -> Self {
        self.rate_limit = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<FetchClient, FetchError> {
        let inner = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()?;

        Ok(FetchClient {
            inner,
            rate_limiter: RateLimiter::new(self.rate_limit),
        })
    }
}

/// Production page fetcher with per-host rate limiting.
pub struct FetchClient {
    inner: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl FetchClient {
    pub fn new() -> Result<Self, FetchError> {
        FetchClientBuilder::new().build()
    }

    pub fn builder() -> FetchClientBuilder {
        FetchClientBuilder::new()
    }
}

#[async_trait]
impl HttpClient for FetchClient {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| UrlError::Malformed(e.to_string()))?;

        if let Some(host) = parsed.host_str() {
            self.rate_limiter.wait(host).await;
        }

        tracing::debug!(url, "network: fetching");
        let response = self.inner.get(parsed).send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::debug!(url, status = %status, "network: request failed");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // reqwest decodes using the charset from Content-Type, defaulting to UTF-8
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::InvalidEncoding(e.to_string()))?;
        tracing::debug!(url, bytes = body.len(), "network: fetched successfully");
        Ok(body)
    }
}

/// Canned response for [`MockClient`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    Html(String),
    Status(u16),
    Error(String),
}

/// HTTP client serving canned responses, for tests.
#[derive(Default)]
pub struct MockClient {
    responses: HashMap<String, MockResponse>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, response: MockResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_response(url, MockResponse::Html(html.to_string()))
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(url, MockResponse::Status(status))
    }

    pub fn with_error(self, url: &str, error: &str) -> Self {
        self.with_response(url, MockResponse::Error(error.to_string()))
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        match self.responses.get(url) {
            Some(MockResponse::Html(html)) => Ok(html.clone()),
            Some(MockResponse::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(MockResponse::Error(e)) => Err(FetchError::Other(e.clone())),
            None => Err(FetchError::Other(format!(
                "No mock response for URL: {}",
                url
            ))),
        }
    }
}
