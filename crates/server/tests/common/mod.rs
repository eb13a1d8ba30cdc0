//! Common test utilities for API testing with a scripted encoder.
//!
//! The fixture builds the real router over an engine whose strategies are
//! [`ScriptedStrategy`](encodeq_core::testing::ScriptedStrategy)s, so whole
//! conversion runs can be driven over HTTP without ffmpeg.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use encodeq_core::{
    testing::{RecordingPropagator, ScriptedStrategyFactory},
    AttributePropagator, Config, ConversionEngine, StrategyFactory,
};
use encodeq_server::state::{AppState, Engine};

/// Test fixture holding an in-process router and its engine.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_enqueue() {
///     let fixture = TestFixture::new(ScriptedStrategyFactory::new());
///     let file = fixture.media("a.mp4");
///
///     let response = fixture.post("/api/v1/queue", json!({ "paths": [file] })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Engine behind the router, for waiting on runs
    pub engine: Engine,
    /// Records attribute copies and deletions
    pub propagator: Arc<RecordingPropagator>,
    /// Directory holding source files
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose engine uses the given scripted factory.
    pub fn new(factory: ScriptedStrategyFactory) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let propagator = Arc::new(RecordingPropagator::new());
        let config = Config::default();

        let engine = ConversionEngine::new(
            config.engine.clone(),
            Arc::new(factory) as Arc<dyn StrategyFactory>,
            Arc::clone(&propagator) as Arc<dyn AttributePropagator>,
        );
        let state = Arc::new(AppState::new(config, engine.clone()));
        let router = encodeq_server::api::create_router(state);

        Self {
            router,
            engine,
            propagator,
            temp_dir,
        }
    }

    /// Create a source file in the fixture directory.
    pub fn media(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, b"source").expect("Failed to write source file");
        path
    }

    /// Wait for the current run to finish.
    pub async fn wait_idle(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.engine.wait_until_idle())
            .await
            .expect("run did not finish");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
