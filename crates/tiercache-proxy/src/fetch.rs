//! Fetch operation contract

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use std::collections::BTreeMap;
use url::Url;

use crate::error::ProxyError;

/// Outbound resource request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    /// Header names are lower-case
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl FetchRequest {
    /// Create a GET request for a URL
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Parse a URL and create a GET request for it
    pub fn parse(url: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(url)
            .map_err(|e| ProxyError::InvalidRequest(format!("{}: {}", url, e)))?;
        Ok(Self::get(url))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

/// Response returned by a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// Header names are lower-case
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The fetch operation consumed by the cache engine
///
/// Implementations perform exactly one attempt; the engine never retries.
/// Any non-transport outcome (including 4xx/5xx statuses) is a response,
/// not an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ProxyError>;
}
