//! Polychaeta Relay HTTP API
//!
//! HTTP query surface and WebSocket push server, built with Axum. They bind
//! separate listeners.
//!
//! # Endpoints
//!
//! ## Query (API listener, default port 3001)
//! - `GET /api/devices` - List discovered devices
//! - `GET /api/data` - Latest reading of every device
//! - `GET /api/data/:deviceId` - Latest reading of one device (404 if none)
//!
//! ## Health (API listener)
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe (broker connected)
//! - `GET /health` - Full health status
//!
//! ## WebSocket (push listener, default port 3002)
//! - `GET /` or `GET /ws` - Real-time push connection
//!
//! # Example
//!
//! ```rust,ignore
//! use polychaeta_relay::api::{serve, AppState};
//! use polychaeta_relay::config::Config;
//!
//! let config = Config::default();
//! let (_tx, shutdown) = tokio::sync::watch::channel(false);
//! serve(state, &config.api, &config.websocket, shutdown).await?;
//! ```

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ApiConfig, WebSocketConfig};
use crate::websocket::websocket_handler;

/// Build the query API router with all routes and middleware
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let api_routes = Router::new()
        .route("/devices", get(routes::devices::list_devices))
        .route("/data", get(routes::data::list_latest))
        .route("/data/:deviceId", get(routes::data::get_latest));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Build the WebSocket push router
pub fn build_push_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET])
}

/// Start both listeners and serve until `shutdown` flips to true
///
/// Bind failures are returned before anything is served.
pub async fn serve(
    state: AppState,
    api: &ApiConfig,
    ws: &WebSocketConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ApiError> {
    let shared_state = Arc::new(state);
    let api_router = build_router(Arc::clone(&shared_state), &api.cors_origins);
    let push_router = build_push_router(shared_state);

    let api_listener = bind(&api.addr()).await?;
    let ws_listener = bind(&ws.addr()).await?;

    tracing::info!("HTTP API listening on {}", api.addr());
    tracing::info!("WebSocket server listening on {}", ws.addr());

    let api_server = axum::serve(api_listener, api_router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown.clone()))
        .into_future();
    let ws_server = axum::serve(ws_listener, push_router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .into_future();

    let (api_result, ws_result) = tokio::join!(api_server, ws_server);
    api_result.map_err(|e| ApiError::Internal(format!("API server error: {}", e)))?;
    ws_result.map_err(|e| ApiError::Internal(format!("WebSocket server error: {}", e)))?;

    tracing::info!("Servers shut down gracefully");
    Ok(())
}

async fn bind(addr: &str) -> Result<TcpListener, ApiError> {
    TcpListener::bind(addr).await.map_err(|source| ApiError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Resolve once the shutdown flag is set or its sender is gone
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
