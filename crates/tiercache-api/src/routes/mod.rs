//! API routes

mod control;
mod fetch;
mod health;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(fetch::routes())
        .merge(control::routes())
        .with_state(state)
        // Proxied request bodies (16MB max)
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024));

    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(get_metrics))
                .with_state(handle),
        );
    }

    router
}

/// GET /metrics - Prometheus metrics endpoint
async fn get_metrics(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use serde_json::{Value, json};
    use tiercache_core::{
        CACHE_STATUS_HEADER, CacheEngine, EngineConfig, Favorability, SharedFavorability,
    };
    use tiercache_proxy::{FetchRequest, FetchResponse, Fetcher, ProxyError};
    use tiercache_storage::MemoryBlobStore;
    use tower::ServiceExt;

    /// Echoes the request path, or fails for hosts named "down"
    struct EchoFetcher;

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ProxyError> {
            if request.url.host_str() == Some("down.example.com") {
                return Err(ProxyError::Connection("refused".to_string()));
            }
            Ok(FetchResponse::new(200, format!("echo {}", request.url.path()))
                .with_header("content-type", "text/plain")
                .with_header("x-method", request.method.as_str()))
        }
    }

    async fn app() -> (Router, AppState) {
        let favorability = SharedFavorability::new(Favorability::Medium);
        let engine = CacheEngine::new(
            EngineConfig::default(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(EchoFetcher),
            Arc::new(favorability.clone()),
        )
        .await
        .unwrap();
        let state = AppState::new(engine, favorability);
        (create_router(state.clone(), None), state)
    }

    async fn send(
        router: &Router,
        request: Request<Body>,
    ) -> (StatusCode, Vec<(String, String)>, Bytes) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app().await;
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, _, body) = send(&router, request).await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tiers"], 3);
    }

    #[tokio::test]
    async fn test_fetch_caches_second_request() {
        let (router, _) = app().await;
        let uri = "/fetch?url=https%3A%2F%2Fexample.com%2Fapp.js";

        let (status, headers, body) =
            send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from_static(b"echo /app.js"));
        assert_eq!(header(&headers, CACHE_STATUS_HEADER), Some("network"));

        let (_, headers, body) =
            send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(body, Bytes::from_static(b"echo /app.js"));
        assert_eq!(header(&headers, CACHE_STATUS_HEADER), Some("cache"));
        assert_eq!(header(&headers, "content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_fetch_unavailable_marker() {
        let (router, _) = app().await;
        let uri = "/fetch?url=https%3A%2F%2Fdown.example.com%2Fapi%2Fx";

        let (status, headers, body) =
            send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.is_empty());
        assert_eq!(header(&headers, CACHE_STATUS_HEADER), Some("unavailable"));
    }

    #[tokio::test]
    async fn test_fetch_post_passes_through() {
        let (router, _) = app().await;
        let request = Request::post("/fetch?url=https%3A%2F%2Fexample.com%2Fapi%2Fitems")
            .body(Body::from("{}"))
            .unwrap();

        let (status, headers, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, CACHE_STATUS_HEADER), Some("passthrough"));
        assert_eq!(header(&headers, "x-method"), Some("POST"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let (router, _) = app().await;
        let request = Request::get("/fetch?url=not-a-url").body(Body::empty()).unwrap();

        let (status, _, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["errors"][0]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_control_channel() {
        let (router, state) = app().await;
        state
            .engine
            .handle(&FetchRequest::parse("https://example.com/api/users").unwrap())
            .await;

        let (status, _, body) = send(
            &router,
            json_request("POST", "/api/v1/control", json!({"type": "GET_STATS"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["type"], "STATS");
        assert_eq!(body["tierCount"], 3);
        assert_eq!(body["favorability"], "medium");

        let invalidate = json!({"type": "INVALIDATE", "pattern": "/api/"});
        let (_, _, body) = send(
            &router,
            json_request("POST", "/api/v1/control", invalidate.clone()),
        )
        .await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"type": "INVALIDATED", "invalidatedCount": 1}));

        let (_, _, body) =
            send(&router, json_request("POST", "/api/v1/control", invalidate)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["invalidatedCount"], 0);

        let (_, _, body) = send(
            &router,
            json_request("POST", "/api/v1/control", json!({"type": "FORCE_MAINTENANCE"})),
        )
        .await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"type": "ACK"}));

        state.engine.flush_background().await;
        assert!(state.engine.last_maintenance_at().is_some());

        let (_, _, body) = send(
            &router,
            json_request("POST", "/api/v1/control", json!({"type": "RESET_PATTERNS"})),
        )
        .await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["type"], "PATTERNS_RESET");
        assert_eq!(state.engine.patterns_learned(), 0);
    }

    #[tokio::test]
    async fn test_rest_shortcuts() {
        let (router, state) = app().await;

        let (status, _, body) =
            send(&router, Request::get("/api/v1/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["tierCount"], 3);
        assert_eq!(body["totalSizeHuman"], "0 B");
        assert_eq!(body["hitRate"], 0.0);

        let (status, _, body) = send(
            &router,
            json_request("POST", "/api/v1/invalidate", json!({"pattern": "nothing"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["invalidatedCount"], 0);

        let request = Request::post("/api/v1/maintenance").body(Body::empty()).unwrap();
        let (status, _, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        state.engine.flush_background().await;
    }

    #[tokio::test]
    async fn test_favorability_update() {
        let (router, state) = app().await;

        let (status, _, body) = send(
            &router,
            json_request("PUT", "/api/v1/favorability", json!({"favorability": "high"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["favorability"], "high");
        assert_eq!(state.engine.favorability(), Favorability::High);

        let (status, _, _) = send(
            &router,
            json_request("PUT", "/api/v1/favorability", json!({"favorability": "extreme"})),
        )
        .await;
        assert!(status.is_client_error());

        let (_, _, body) = send(
            &router,
            Request::get("/api/v1/favorability").body(Body::empty()).unwrap(),
        )
        .await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["favorability"], "high");
    }
}
