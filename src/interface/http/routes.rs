use std::path::PathBuf;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::handlers::{
    current_handler, health_handler, interfaces_handler, metrics_handler, AppState,
};

/// API routes, plus the dashboard directory at `/` when one is configured
pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/current", get(current_handler))
        .route("/api/interfaces", get(interfaces_handler))
        .route("/api/metrics", get(metrics_handler));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::adapters::MemoryStore;
    use crate::application::fake::{FakeSource, FakeState};
    use crate::application::{detect_identity, MonitoringService, QueryEngine};
    use crate::domain::{unix_now, NetworkInterface, NetworkMetrics, NicClassifier, Sample};
    use crate::ports::MetricStore;

    async fn state() -> (AppState, Arc<MemoryStore>) {
        let source = Arc::new(FakeSource::new(FakeState {
            interfaces: vec![
                NetworkInterface::new("eth0".into(), true, NetworkMetrics::zero()),
                NetworkInterface::new("docker0".into(), true, NetworkMetrics::zero()),
            ],
            connections: Some(Vec::new()),
            ..Default::default()
        }));
        let store = Arc::new(MemoryStore::new());
        let identity = detect_identity(source.as_ref()).await;
        let monitoring = MonitoringService::new(source, identity, NicClassifier::default(), "eth0");

        let state = AppState {
            monitoring: Arc::new(monitoring),
            query: Arc::new(QueryEngine::new(store.clone(), Duration::from_secs(30))),
            store: store.clone(),
        };
        (state, store)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_sample_count() {
        let (state, store) = state().await;
        store.append(&Sample::new(1234.5)).await.unwrap();

        let (status, body) = get_json(create_router(state, None), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["hostname"], "testhost");
        assert_eq!(body["default_nic"], "eth0");
        assert_eq!(body["samples"], 1);
        assert_eq!(body["last_sample"], 1234.5);
    }

    #[tokio::test]
    async fn metrics_unknown_range_falls_back_to_one_hour() {
        let (state, store) = state().await;
        let now = unix_now();
        store.append(&Sample::new(now - 7000.0)).await.unwrap();
        store.append(&Sample::new(now - 60.0)).await.unwrap();

        let (status, body) = get_json(create_router(state, None), "/api/metrics?range=bogus").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["range"], "1h");
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["totals"]["sent_gb"], 0.0);
    }

    #[tokio::test]
    async fn metrics_honours_known_range() {
        let (state, store) = state().await;
        let now = unix_now();
        store.append(&Sample::new(now - 7000.0)).await.unwrap();
        store.append(&Sample::new(now - 60.0)).await.unwrap();

        let (_, body) = get_json(create_router(state, None), "/api/metrics?range=2h").await;

        assert_eq!(body["range"], "2h");
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert!(body["data"][0]["conns"].is_object());
    }

    #[tokio::test]
    async fn interfaces_lists_default_and_virtual() {
        let (state, _) = state().await;

        let (status, body) = get_json(create_router(state, None), "/api/interfaces").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["default"], "eth0");
        assert_eq!(body["interfaces"][0]["name"], "docker0");
        assert_eq!(body["interfaces"][0]["is_virtual"], true);
        assert_eq!(body["interfaces"][1]["is_default"], true);
    }

    #[tokio::test]
    async fn current_returns_snapshot_sections() {
        let (state, _) = state().await;

        let (status, body) = get_json(create_router(state, None), "/api/current").await;

        assert_eq!(status, StatusCode::OK);
        for section in ["cpu", "ram", "swap", "disk", "network", "per_nic", "system", "connections"] {
            assert!(body.get(section).is_some(), "missing {section}");
        }
        assert_eq!(body["network"]["default_nic"], "eth0");
        assert_eq!(body["connections"]["Total"]["tcp"], 0);
    }

    #[tokio::test]
    async fn static_directory_served_at_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hostpulse</h1>").unwrap();
        let (state, _) = state().await;
        let router = create_router(state, Some(dir.path().to_path_buf()));

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>hostpulse</h1>");
    }

    #[tokio::test]
    async fn unknown_path_without_static_dir_is_not_found() {
        let (state, _) = state().await;
        let response = create_router(state, None)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
