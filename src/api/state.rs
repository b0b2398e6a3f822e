//! Application State
//!
//! Shared state accessible by all HTTP and WebSocket handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::broker::BrokerStatus;
use crate::relay::QueryApi;
use crate::websocket::ConnectionHub;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Read access to the registry and latest readings
    pub query: QueryApi,
    /// WebSocket connection hub for real-time streaming
    pub ws_hub: Arc<ConnectionHub>,
    /// Broker availability, owned by the broker client
    pub broker: BrokerStatus,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(query: QueryApi, ws_hub: Arc<ConnectionHub>, broker: BrokerStatus) -> Self {
        Self {
            query,
            ws_hub,
            broker,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}
