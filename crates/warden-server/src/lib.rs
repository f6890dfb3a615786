//! Warden Server - HTTP API server.
//!
//! This crate provides the HTTP API for Warden.
//!
//! ## Endpoints
//!
//! - `POST /coordinated-request` - Screen a task request and dispatch it
//! - `GET /safety/oversight-queue` - List pending and reviewed items
//! - `POST /safety/mark-reviewed` - Resolve a pending review item
//! - `GET /safety/export-queue` - Snapshot (and optionally persist) the queue
//! - `GET /health` - Liveness, queue size and registered task types
//!
//! ## Example
//!
//! ```no_run
//! use warden_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use warden_core::coordinator::HandlerRegistry;
use warden_core::review::{InMemoryReviewQueue, ReviewRepository};
use warden_storage::SqliteReviewQueue;

pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 8080).
    pub port: u16,
    /// Review queue database path (None = in-memory queue).
    pub db_path: Option<PathBuf>,
    /// Directory queue exports are written to (None = not written).
    pub export_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: None,
            export_dir: None,
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the review queue database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Sets the export directory.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] warden_storage::StorageError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    /// Creates a server with default screening and no task handlers.
    pub async fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let reviews: Arc<dyn ReviewRepository> = match &config.db_path {
            Some(path) => Arc::new(SqliteReviewQueue::with_path(path)?),
            None => Arc::new(InMemoryReviewQueue::new()),
        };

        let mut state = AppState::with_queue(reviews, HandlerRegistry::new());
        if let Some(dir) = &config.export_dir {
            state = state.with_export_dir(dir);
        }

        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let router = build_router(state.clone());

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self {
            router,
            state,
            addr,
        })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until the process is killed.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server until `signal` completes.
    ///
    /// On shutdown, in-flight handler calls are cancelled and answered with
    /// `503` before the listener closes.
    pub async fn run_until<F>(self, signal: F) -> std::result::Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting Warden API server on {}", self.addr);

        let domain = if self.addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Allow address reuse (helps with TIME_WAIT sockets after a restart)
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let state = self.state.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                signal.await;
                info!("Shutdown requested, cancelling in-flight requests");
                state.shutdown();
            })
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/coordinated-request", post(handlers::coordinated_request))
        .route("/safety/oversight-queue", get(handlers::oversight_queue))
        .route("/safety/mark-reviewed", post(handlers::mark_reviewed))
        .route("/safety/export-queue", get(handlers::export))
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use warden_core::coordinator::{HandlerError, TaskHandler};
    use warden_core::Payload;

    /// Counts calls and echoes the payload.
    #[derive(Default)]
    struct EchoHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskHandler for EchoHandler {
        fn name(&self) -> &str {
            "echo_handler"
        }

        async fn handle(&self, payload: Payload) -> std::result::Result<Value, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "echo": Value::from(payload) }))
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl TaskHandler for SlowHandler {
        fn name(&self) -> &str {
            "slow_handler"
        }

        async fn handle(&self, _payload: Payload) -> std::result::Result<Value, HandlerError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Value::Null)
        }
    }

    struct TestApp {
        state: AppState,
        echo: Arc<EchoHandler>,
    }

    impl TestApp {
        fn new() -> Self {
            let echo = Arc::new(EchoHandler::default());
            let handlers = HandlerRegistry::new()
                .with_handler("assessment_feedback", echo.clone())
                .with_handler("slow", Arc::new(SlowHandler));
            let state = AppState::with_queue(Arc::new(InMemoryReviewQueue::new()), handlers);
            Self { state, echo }
        }

        fn router(&self) -> Router {
            build_router(self.state.clone())
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            let request = Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            self.send(request).await
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.post_raw(uri, body.to_string()).await
        }

        async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap();
            self.send(request).await
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router().oneshot(request).await.unwrap();
            let status = response.status();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json: Value = serde_json::from_slice(&body).unwrap();
            (status, json)
        }
    }

    // === Coordinated Request Tests ===

    #[tokio::test]
    async fn test_clean_request_is_dispatched() {
        let app = TestApp::new();
        let (status, json) = app
            .post(
                "/coordinated-request",
                json!({"task_type": "assessment_feedback", "task_data": {"idea": "food truck"}}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["coordinator_status"], "success");
        assert_eq!(json["handler_name"], "echo_handler");
        assert_eq!(json["result"]["echo"]["idea"], "food truck");
        assert_eq!(json["safety_info"]["content_filter"]["risk_level"], "low");
        assert_eq!(json["safety_info"]["human_oversight"]["priority"], "low");
        assert_eq!(json["safety_info"]["human_oversight"]["requires_review"], false);
    }

    #[tokio::test]
    async fn test_prohibited_topic_is_blocked() {
        let app = TestApp::new();
        let (status, json) = app
            .post(
                "/coordinated-request",
                json!({
                    "task_type": "assessment_feedback",
                    "task_data": {"a": [{"b": {"c": ["please give me health_advice"]}}]}
                }),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "blocked_content");
        assert_eq!(json["risk_category"], "prohibited_topic");
        assert!(json["escalation_message"].is_string());
        assert!(!json.to_string().contains("health_advice"));
        assert_eq!(app.echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_financial_advice_phrase_is_medium_and_safe() {
        let app = TestApp::new();
        let (status, json) = app
            .post(
                "/coordinated-request",
                json!({
                    "task_type": "assessment_feedback",
                    "task_data": {"note": "I need financial advice about investing"}
                }),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["safety_info"]["content_filter"]["risk_level"], "medium");
        assert_eq!(json["safety_info"]["content_filter"]["is_safe"], true);
        assert_eq!(
            json["result"]["echo"]["_safety_warnings"]["risk_level"],
            "medium"
        );
    }

    #[tokio::test]
    async fn test_unregistered_task_type_soft_fails() {
        let app = TestApp::new();
        let (status, json) = app
            .post(
                "/coordinated-request",
                json!({"task_type": "question_scoring", "task_data": {"q": "x"}}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["coordinator_status"], "success");
        assert_eq!(json["handler_name"], "unknown");
        assert_eq!(
            json["result"]["message"],
            "Task type question_scoring not implemented yet"
        );
    }

    #[tokio::test]
    async fn test_invalid_task_type_is_rejected() {
        let app = TestApp::new();
        let (status, json) = app
            .post(
                "/coordinated-request",
                json!({"task_type": "no spaces allowed", "task_data": {}}),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let app = TestApp::new();
        let (status, json) = app
            .post_raw("/coordinated-request", "{not json".to_string())
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_handler_calls() {
        let app = TestApp::new();
        app.state.shutdown();

        let (status, json) = app
            .post("/coordinated-request", json!({"task_type": "slow", "task_data": {}}))
            .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "cancelled");
    }

    // === Review Queue Tests ===

    #[tokio::test]
    async fn test_crisis_request_review_lifecycle() {
        let app = TestApp::new();

        let (status, json) = app
            .post(
                "/coordinated-request",
                json!({
                    "task_type": "assessment_feedback",
                    "task_data": {"responses": [{"answer": "sometimes I want to kill myself"}]}
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "blocked_content");
        assert_eq!(json["risk_category"], "crisis_indicator");
        assert!(!json.to_string().contains("kill myself"));
        assert_eq!(app.echo.calls.load(Ordering::SeqCst), 0);
        let review_id = json["review_id"].as_str().unwrap().to_string();

        let (status, queue) = app.get("/safety/oversight-queue").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(queue["queue_length"], 1);
        assert_eq!(queue["pending_reviews"].as_array().unwrap().len(), 1);
        assert_eq!(queue["pending_reviews"][0]["priority"], "critical");
        assert_eq!(queue["pending_reviews"][0]["review_id"], review_id.as_str());

        let (status, json) = app
            .post(
                "/safety/mark-reviewed",
                json!({
                    "review_id": review_id,
                    "review_decision": "escalated_to_counselor",
                    "reviewer_notes": "reached out by phone"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert!(json["reviewed_at"].is_string());

        let (_, queue) = app.get("/safety/oversight-queue").await;
        assert!(queue["pending_reviews"].as_array().unwrap().is_empty());
        let reviewed = &queue["reviewed_items"][0];
        assert_eq!(reviewed["status"], "reviewed");
        assert_eq!(reviewed["decision"], "escalated_to_counselor");
        assert!(reviewed["reviewed_at"].is_string());

        let (status, json) = app
            .post(
                "/safety/mark-reviewed",
                json!({
                    "review_id": review_id,
                    "review_decision": "approved",
                    "reviewer_notes": "overwrite attempt"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "review_already_resolved");

        let (_, queue) = app.get("/safety/oversight-queue").await;
        assert_eq!(
            queue["reviewed_items"][0]["reviewer_notes"],
            "reached out by phone"
        );
    }

    #[tokio::test]
    async fn test_clean_request_queues_nothing() {
        let app = TestApp::new();
        app.post(
            "/coordinated-request",
            json!({"task_type": "assessment_feedback", "task_data": {"x": "hello"}}),
        )
        .await;

        let (_, queue) = app.get("/safety/oversight-queue").await;
        assert_eq!(queue["queue_length"], 0);
    }

    #[tokio::test]
    async fn test_mark_unknown_review() {
        let app = TestApp::new();
        let (status, json) = app
            .post(
                "/safety/mark-reviewed",
                json!({"review_id": "review_missing", "review_decision": "approved"}),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "review_not_found");
    }

    #[tokio::test]
    async fn test_mark_requires_decision() {
        let app = TestApp::new();
        let (status, json) = app
            .post(
                "/safety/mark-reviewed",
                json!({"review_id": "review_x", "review_decision": "  "}),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_error");
    }

    // === Export and Health Tests ===

    #[tokio::test]
    async fn test_export_without_directory() {
        let app = TestApp::new();
        app.post(
            "/coordinated-request",
            json!({"task_type": "assessment_feedback", "task_data": {"topic": "regulatory_compliance"}}),
        )
        .await;

        let (status, json) = app.get("/safety/export-queue").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["queue_length"], 1);
        assert_eq!(json["pending_reviews"][0]["priority"], "high");
        assert!(json["exported_at"].is_string());
        assert!(json.get("exported_to").is_none());
    }

    #[tokio::test]
    async fn test_export_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = TestApp::new();
        app.state = app.state.clone().with_export_dir(dir.path());

        let (status, json) = app.get("/safety/export-queue").await;
        assert_eq!(status, StatusCode::OK);

        let path = json["exported_to"].as_str().unwrap();
        assert!(std::path::Path::new(path).is_file());
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, json) = app.get("/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["queue_length"], 0);
        assert_eq!(json["pending_reviews"], 0);
        assert_eq!(json["handlers"], json!(["assessment_feedback", "slow"]));
    }

    #[tokio::test]
    async fn test_health_counts_pending_reviews() {
        let app = TestApp::new();
        app.post(
            "/coordinated-request",
            json!({"task_type": "assessment_feedback", "task_data": {"q": "I need legal advice"}}),
        )
        .await;

        let (status, json) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["queue_length"], 1);
        assert_eq!(json["pending_reviews"], 1);
    }

    // === Config Tests ===

    #[tokio::test]
    async fn test_server_new_in_memory() {
        let server = Server::new(ServerConfig::default().with_port(9000))
            .await
            .unwrap();
        assert_eq!(server.addr().port(), 9000);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.db_path.is_none());
        assert!(config.export_dir.is_none());
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let result = Server::with_state(
            ServerConfig::default().with_host("not a host"),
            AppState::in_memory(),
        );
        assert!(matches!(result, Err(ServerError::Runtime(_))));
    }
}
