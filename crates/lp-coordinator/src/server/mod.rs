//! Transports that deliver connections to the coordinator
//!
//! Browsers connect over WebSocket (`GET /ws`); scripts and terminal tools
//! can use the optional line-delimited TCP listener. Both hand the
//! coordinator the same `Connected` / `Client` / `Disconnected` events, so
//! the coordinator never knows which transport a connection came from.

mod tcp;
mod ws;

pub use tcp::TcpTransport;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

use lp_core::ServerConfig;

use crate::coordinator::CoordinatorHandle;

/// Shared state passed to HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the coordinator task
    pub coordinator: CoordinatorHandle,
    /// Daemon configuration
    pub config: Arc<ServerConfig>,
    /// When the daemon started
    pub start_time: Instant,
    /// Cancelled on shutdown; open sockets close when it fires
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create handler state
    pub fn new(
        coordinator: CoordinatorHandle,
        config: Arc<ServerConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            config,
            start_time: Instant::now(),
            shutdown,
        }
    }
}

/// Build the HTTP router with the WebSocket and health routes
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(cors)
}

/// Serve HTTP on an already-bound listener until the shutdown token fires
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
}

/// Health check endpoint
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.status().await {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "uptimeSecs": state.start_time.elapsed().as_secs(),
                "version": env!("CARGO_PKG_VERSION"),
                "connections": status.connections,
                "participants": status.participants,
                "presenterPresent": status.presenter_present,
                "pollId": status.poll_id,
                "pollOpen": status.poll_open,
                "answered": status.answered,
                "totalVotes": status.total_votes,
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unavailable",
                "message": e.to_string(),
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;
    use axum::body::Body;
    use axum::http::Request;
    use lp_core::PollPolicy;
    use tower::ServiceExt;

    fn test_state(coordinator: CoordinatorHandle) -> AppState {
        AppState::new(
            coordinator,
            Arc::new(ServerConfig::default()),
            CancellationToken::new(),
        )
    }

    async fn get_health(router: Router) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_status() {
        let cancel = CancellationToken::new();
        let (handle, _task) = Coordinator::spawn(PollPolicy::default(), 16, cancel.clone());

        let (status, body) = get_health(build_router(test_state(handle))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["pollOpen"], false);
        assert!(body["pollId"].is_null());

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_health_unavailable_without_coordinator() {
        let (handle, inbox) = CoordinatorHandle::channel(1);
        drop(inbox);

        let (status, body) = get_health(build_router(test_state(handle))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
    }

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        // Builds without panicking even with a bad origin in the list
        let _layer = cors_layer(&[
            "https://poll.example.edu".to_string(),
            "bad\norigin".to_string(),
        ]);
    }
}
