//! Responses returned by the engine

use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use tiercache_proxy::FetchResponse;

use crate::entry::CacheEntry;

/// Header carrying [`ResponseSource::as_str`] on every engine response
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";

/// Where a response came from
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    /// Fresh from the fetch operation
    Network,
    /// Served from a tier's store
    Cache,
    /// Synthesized: network failed and nothing usable was cached
    Unavailable,
    /// Synthesized: cache-only lookup found nothing
    NotFound,
    /// Not cacheable; forwarded to the fetch operation unmodified
    Passthrough,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Unavailable => "unavailable",
            ResponseSource::NotFound => "not-found",
            ResponseSource::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl CachedResponse {
    fn new(
        status: u16,
        mut headers: BTreeMap<String, String>,
        body: Bytes,
        source: ResponseSource,
    ) -> Self {
        headers.insert(CACHE_STATUS_HEADER.to_string(), source.as_str().to_string());
        Self {
            status,
            headers,
            body,
            source,
        }
    }

    pub fn from_network(response: FetchResponse) -> Self {
        Self::new(
            response.status,
            response.headers,
            response.body,
            ResponseSource::Network,
        )
    }

    pub fn from_entry(entry: &CacheEntry) -> Self {
        Self::new(
            entry.status,
            entry.headers.clone(),
            entry.payload.clone(),
            ResponseSource::Cache,
        )
    }

    pub fn passthrough(response: FetchResponse) -> Self {
        Self::new(
            response.status,
            response.headers,
            response.body,
            ResponseSource::Passthrough,
        )
    }

    pub fn unavailable() -> Self {
        Self::new(
            503,
            BTreeMap::new(),
            Bytes::new(),
            ResponseSource::Unavailable,
        )
    }

    pub fn not_found() -> Self {
        Self::new(404, BTreeMap::new(), Bytes::new(), ResponseSource::NotFound)
    }

    /// Whether the engine made this response up rather than relaying one
    pub fn is_synthesized(&self) -> bool {
        matches!(
            self.source,
            ResponseSource::Unavailable | ResponseSource::NotFound
        )
    }
}
