//! HTTP fetcher backed by reqwest

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ProxyError;
use crate::fetch::{FetchRequest, FetchResponse, Fetcher};

/// HTTP fetcher configuration
#[derive(Clone, Debug)]
pub struct HttpFetcherConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent sent with every request
    pub user_agent: String,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("tiercache/{}", env!("CARGO_PKG_VERSION")),
            skip_tls_verify: false,
        }
    }
}

/// Fetcher performing real HTTP requests
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: HttpFetcherConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!(
            "Created HTTP fetcher (timeout: {:?}, user agent: {})",
            config.timeout, config.user_agent
        );

        Ok(Self { client })
    }

    fn request_headers(request: &FetchRequest) -> Result<HeaderMap, ProxyError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProxyError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProxyError::InvalidRequest(format!("header value: {}", e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ProxyError> {
        debug!("Fetching {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::request_headers(request)?);

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status().as_u16();

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await.map_err(classify_error)?;

        debug!(
            "Fetched {} {} -> {} ({} bytes)",
            request.method,
            request.url,
            status,
            body.len()
        );

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_error(e: reqwest::Error) -> ProxyError {
    if e.is_timeout() {
        ProxyError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProxyError::Connection(e.to_string())
    } else {
        ProxyError::Http(e)
    }
}
