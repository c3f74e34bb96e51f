//! Cache key normalization

use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use tiercache_proxy::FetchRequest;
use url::Url;

/// Normalized identity of a cacheable request: `"<METHOD> <absolute url>"`
///
/// The URL is re-serialized by the `url` crate, so scheme and host are
/// lower-cased and default ports dropped. The fragment is removed; the query
/// string is kept verbatim. Keys are plain strings and stay stable across
/// restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("{} {}", method.as_str(), url))
    }

    pub fn from_request(request: &FetchRequest) -> Self {
        Self::new(&request.method, &request.url)
    }

    /// Wrap a key previously produced by [`CacheKey::new`]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn method(&self) -> &str {
        self.0.split_once(' ').map(|(m, _)| m).unwrap_or("")
    }

    pub fn url(&self) -> Option<Url> {
        let (_, url) = self.0.split_once(' ')?;
        Url::parse(url).ok()
    }

    /// Rebuild the GET request this key identifies
    pub fn to_request(&self) -> Option<FetchRequest> {
        if self.method() != Method::GET.as_str() {
            return None;
        }
        self.url().map(FetchRequest::get)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
