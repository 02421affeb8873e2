//! HTTP transport collaborator.
//!
//! The pipeline never talks to `reqwest` directly; it goes through the
//! [`Transport`] trait so the rate controller stays the single entry point
//! and tests can serve a fixture site from memory.

use crate::error::TransportError;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::{debug, instrument};

/// Browser-like user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// A fetched resource: status code plus raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL as requested; errors are recorded against it.
    pub url: String,
    /// URL after redirects; relative links resolve against it.
    pub final_url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status,
            body: body.into(),
        }
    }

    pub fn with_final_url(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = final_url.into();
        self
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Something that can fetch a URL and, when needed, render client-side
/// script into the page body.
pub trait Transport {
    /// Issue a GET request. Non-2xx statuses are returned as pages, not
    /// errors; only client-level failures are `Err`.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, TransportError>;

    /// Populate script-driven content in `page`. The caller bounds this with
    /// a timeout. Static transports leave the page untouched.
    async fn render(&self, _page: &mut FetchedPage) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Run the render step, treating anything slower than `timeout` as failed.
///
/// # Errors
///
/// [`TransportError::RenderTimeout`] when the bound is exceeded, otherwise
/// whatever the transport's render step returns.
pub async fn render_within<T: Transport>(
    transport: &T,
    page: &mut FetchedPage,
    timeout: Duration,
) -> Result<(), TransportError> {
    let url = page.url.clone();
    match tokio::time::timeout(timeout, transport.render(page)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::RenderTimeout { url, timeout }),
    }
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client that sends `user_agent` on every request.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised. An invalid user agent
    /// falls back to [`DEFAULT_USER_AGENT`].
    pub fn new(user_agent: &str, request_timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(USER_AGENT, value);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedPage, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.bytes().await?.to_vec();
        debug!(status, bytes = body.len(), %final_url, "Fetched");
        Ok(FetchedPage::new(url, status, body).with_final_url(final_url))
    }
}
