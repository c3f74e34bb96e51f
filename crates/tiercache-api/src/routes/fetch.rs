//! Proxied fetch endpoint

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::Response,
    routing::any,
};
use bytes::Bytes;
use serde::Deserialize;
use tiercache_core::CachedResponse;
use tiercache_proxy::FetchRequest;
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::state::AppState;

/// Headers that describe one connection and are never forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub url: String,
}

/// ANY /fetch?url=<absolute-url>
async fn fetch(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<FetchQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let url = Url::parse(&query.url)
        .map_err(|e| ApiError::BadRequest(format!("invalid url '{}': {}", query.url, e)))?;

    let mut request = FetchRequest::new(method, url).with_body(body);
    for (name, value) in &headers {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    let response = state.engine.handle(&request).await;
    debug!(
        "{} {} -> {} ({})",
        request.method,
        request.url,
        response.status,
        response.source.as_str()
    );

    into_http_response(response)
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn into_http_response(response: CachedResponse) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);

    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from(response.body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/fetch", any(fetch))
}
