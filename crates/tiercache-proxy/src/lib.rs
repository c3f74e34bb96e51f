//! Tiercache Upstream Fetch
//!
//! This crate defines the fetch operation the cache engine consumes,
//! together with an HTTP implementation built on reqwest.

pub mod client;
pub mod error;
pub mod fetch;

pub use client::{HttpFetcher, HttpFetcherConfig};
pub use error::ProxyError;
pub use fetch::{FetchRequest, FetchResponse, Fetcher};
