//! HTTP client for fetching media

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::storage::ByteStream;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request timed out")]
    Timeout,

    /// URL or header values that cannot form a request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Ordered header list sent with an outbound request
pub type Headers = Vec<(String, String)>;

const ACCEPT: &str = "application/json, text/plain, */*";

/// Browser-like header set sent with every outbound request
#[derive(Debug, Clone)]
pub struct BrowserHeaders {
    pub user_agent: String,
    pub accept_language: String,
}

impl BrowserHeaders {
    /// Headers carrying `cookie`, plus a referer when one is given
    pub fn build(&self, cookie: &str, referer: Option<&str>) -> Headers {
        let mut headers = vec![
            ("accept".to_string(), ACCEPT.to_string()),
            ("accept-language".to_string(), self.accept_language.clone()),
            ("cookie".to_string(), cookie.to_string()),
            ("user-agent".to_string(), self.user_agent.clone()),
        ];
        if let Some(referer) = referer {
            headers.push(("referer".to_string(), referer.to_string()));
        }
        headers
    }
}

impl From<&WorkerConfig> for BrowserHeaders {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        }
    }
}

/// Response body of a successful fetch
pub struct FetchedBody {
    pub stream: ByteStream,
    /// Length announced by the server, if any
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for FetchedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Outbound read of a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<FetchedBody>;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Deadline covering the whole request, body included
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            accept_invalid_certs: false,
        }
    }
}

impl From<&WorkerConfig> for HttpConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.fetch_timeout(),
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }
}

/// reqwest-backed fetcher, shared by every task
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;

        Ok(Self { client })
    }

    /// Send a GET with `headers`, rejecting non-2xx responses
    pub async fn get(&self, url: &str, headers: &Headers) -> Result<reqwest::Response> {
        debug!(url, "Sending request");

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<FetchedBody> {
        let response = self.get(url, headers).await?;
        let content_length = response.content_length();

        debug!(url, content_length = ?content_length, "Response headers received");

        let stream = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(FetchedBody {
            stream,
            content_length,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_redirect() {
        FetchError::TooManyRedirects
    } else if e.is_builder() {
        FetchError::InvalidRequest(describe(&e))
    } else {
        FetchError::RequestFailed(describe(&e))
    }
}

/// reqwest's own message followed by its source chain
fn describe(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}
