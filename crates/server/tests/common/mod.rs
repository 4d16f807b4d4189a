//! Common test utilities for exercising the HTTP API in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use scenetrack_core::{load_config_from_str, Config, TrackerStatus, TrackingMode};
use scenetrack_server::api::create_router;
use scenetrack_server::state::AppState;

const TEST_CONFIG: &str = r#"
[catalog]
boundary_path = "/data/aoi.geojson"
start = "2020-01-01"
end = "2020-12-31"

[tracker]
mode = "pair"
submission_ceiling = 5

[jobs]
api_token = "super-secret-token"
job_name_prefix = "cascade"
"#;

/// In-process server with a status channel the test controls.
pub struct TestFixture {
    pub router: Router,
    pub status_tx: watch::Sender<TrackerStatus>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let config: Config = load_config_from_str(TEST_CONFIG).expect("test config parses");
        let (status_tx, status_rx) = watch::channel(TrackerStatus {
            mode: TrackingMode::Pair,
            ..Default::default()
        });
        let state = Arc::new(AppState::new(config, status_rx));
        Self {
            router: create_router(state),
            status_tx,
        }
    }

    /// Publish a status as the poll loop would.
    pub fn publish(&self, status: TrackerStatus) {
        self.status_tx.send_replace(status);
    }

    /// Make a GET request and parse the body as JSON.
    pub async fn get(&self, path: &str) -> TestResponse {
        let (status, text) = self.get_text(path).await;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        TestResponse { status, body }
    }

    /// Make a GET request and return the raw body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }
}
