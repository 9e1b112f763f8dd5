use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// A failed artifact download
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "HTTP {}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for FetchError {}

/// Downloads artifact bytes for `RemoteUrl` models.
pub trait ArtifactFetcher {
    /// One GET. Anything but a 2xx answer is an error.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// `reqwest` backed fetcher
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher whose requests give up after `timeout`, or never when `None`.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| FetchError { status: None, message: e.to_string() })?;
        Ok(Self { client })
    }
}

impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| FetchError {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError {
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or("request failed").to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError {
            status: Some(status.as_u16()),
            message: format!("failed to read body: {}", e),
        })?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
