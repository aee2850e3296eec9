//! HTTP JSON metadata fetcher.
//!
//! Issues `GET {endpoint}?url={item_id}&{params...}[&quick=true]` and decodes
//! the body as [`Metadata`]. Errors are classified so a retry collaborator
//! can tell transient failures (network, timeout, HTTP 5xx) from permanent
//! ones (undecodable body).

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::Fetcher;
use crate::error::FetchError;
use crate::types::{FetchOptions, Metadata};
use crate::{HuginnError, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`HttpFetcher`].
///
/// ```rust
/// # use huginn::fetcher::HttpFetcherConfig;
/// # use std::time::Duration;
/// let config = HttpFetcherConfig::new("http://127.0.0.1:8080/metadata")
///     .timeout(Duration::from_secs(10));
/// assert_eq!(config.timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Metadata endpoint URL.
    pub endpoint: String,
    /// Whole-request timeout. Default: 30s.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl HttpFetcherConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: crate::version::user_agent(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fetcher backed by an HTTP metadata service.
pub struct HttpFetcher {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self> {
        let endpoint = reqwest::Url::parse(&config.endpoint).map_err(|e| {
            HuginnError::Configuration(format!("invalid endpoint {:?}: {e}", config.endpoint))
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| HuginnError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, item_id: &str, options: &FetchOptions) -> reqwest::Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("url", item_id);
            for (name, value) in &options.params {
                query.append_pair(name, value);
            }
            if options.quick {
                query.append_pair("quick", "true");
            }
        }
        url
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    let message = err.to_string();
    if err.is_timeout() {
        FetchError::timeout(message).with_cause(err)
    } else if err.is_decode() {
        FetchError::format(message).with_cause(err)
    } else {
        FetchError::network(message).with_cause(err)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_metadata(
        &self,
        item_id: &str,
        options: &FetchOptions,
    ) -> std::result::Result<Metadata, FetchError> {
        let url = self.request_url(item_id, options);
        debug!(%url, "requesting metadata");

        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(FetchError::provider(format!("HTTP {status}: {snippet}")));
        }

        let body = response.bytes().await.map_err(classify)?;
        serde_json::from_slice::<Metadata>(&body)
            .map_err(|e| FetchError::format(format!("invalid metadata body: {e}")).with_cause(e))
    }
}
