//! WebSocket Connection Hub
//!
//! The fan-out broadcaster. Holds every open dashboard connection and pushes
//! normalized events to all of them.
//!
//! Each connection gets a bounded outbound queue. Sends never wait: a full or
//! closed queue removes that connection and leaves the others untouched.
//! Registration and broadcasting take the same write lock, so a new
//! connection's catch-up burst is queued before any event broadcast after it.
//!
//! The normalizer writes a store before it emits the event, so a connection
//! can open in between and find the event already in its burst. Each
//! connection remembers the store revisions its burst covered and skips live
//! events at or below them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::PushMessage;
use crate::relay::{
    DeviceRegistry, DiscoveryNotice, EventSink, LatestReadingStore, Reading, Revision,
};

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Manages all WebSocket connections
pub struct ConnectionHub {
    /// Open connections: ConnectionId → ConnectionHandle
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    /// Source of the catch-up burst
    registry: Arc<DeviceRegistry>,
    readings: Arc<LatestReadingStore>,
    config: HubConfig,
}

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Outbound queue length per connection, on top of the catch-up burst
    pub queue_capacity: usize,
    /// Longest a single socket write may take before the connection is dropped
    pub send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            queue_capacity: 256,
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle for sending messages to a specific connection
pub struct ConnectionHandle {
    /// Channel sender for this connection
    pub sender: mpsc::Sender<PushMessage>,
    /// When the connection was opened
    pub connected_at: DateTime<Utc>,
    /// Registry revision covered by the catch-up burst
    pub devices_seen: Revision,
    /// Reading store revision covered by the catch-up burst
    pub readings_seen: Revision,
}

/// A newly opened connection
///
/// `receiver` already holds the catch-up burst.
pub struct Subscription {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<PushMessage>,
}

impl ConnectionHub {
    /// Create a new connection hub over the relay's stores
    pub fn new(
        config: HubConfig,
        registry: Arc<DeviceRegistry>,
        readings: Arc<LatestReadingStore>,
    ) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            registry,
            readings,
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Open a connection and queue its catch-up burst
    ///
    /// The burst is one `discovered_devices` frame listing the registry,
    /// followed by one `sensor_data` frame per stored reading.
    pub async fn connect(&self) -> Result<Subscription, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let (devices_seen, devices) = self.registry.snapshot().await;
        let (readings_seen, readings) = self.readings.snapshot().await;
        let burst_len = 1 + readings.len();

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity.max(1) + burst_len);
        let burst = std::iter::once(PushMessage::DiscoveredDevices(devices))
            .chain(readings.into_iter().map(PushMessage::SensorData));
        for message in burst {
            // Capacity covers the whole burst and the receiver is still held here
            sender.try_send(message).map_err(|_| HubError::SendFailed)?;
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                connected_at: Utc::now(),
                devices_seen,
                readings_seen,
            },
        );

        tracing::info!(
            connection_id = %id,
            catch_up_frames = burst_len,
            connections = connections.len(),
            "Dashboard connected"
        );
        Ok(Subscription { id, receiver })
    }

    /// Remove a connection; no further messages are queued for it
    pub async fn disconnect(&self, id: &str) {
        if let Some(handle) = self.connections.write().await.remove(id) {
            let open_for = Utc::now() - handle.connected_at;
            tracing::info!(
                connection_id = %id,
                open_secs = open_for.num_seconds(),
                "Dashboard disconnected"
            );
        }
    }

    /// Queue a message on every open connection
    ///
    /// Connections whose queue is full or closed are removed. Returns how many
    /// connections hold the message afterwards.
    pub async fn broadcast(&self, message: PushMessage) -> usize {
        self.fan_out(message, |_| false).await
    }

    async fn fan_out(
        &self,
        message: PushMessage,
        already_sent: impl Fn(&ConnectionHandle) -> bool,
    ) -> usize {
        let mut connections = self.connections.write().await;
        let mut failed = Vec::new();

        for (id, handle) in connections.iter() {
            if already_sent(handle) {
                continue;
            }
            if let Err(e) = handle.sender.try_send(message.clone()) {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "closed",
                };
                tracing::warn!(connection_id = %id, reason, "Dropping dashboard connection");
                failed.push(id.clone());
            }
        }

        for id in &failed {
            connections.remove(id);
        }

        let delivered = connections.len();
        tracing::trace!(kind = message.kind(), delivered, dropped = failed.len(), "Broadcast");
        delivered
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[async_trait]
impl EventSink for ConnectionHub {
    async fn deliver_reading(&self, reading: &Reading, revision: Revision) {
        self.fan_out(PushMessage::SensorData(reading.clone()), |handle| {
            revision <= handle.readings_seen
        })
        .await;
    }

    async fn deliver_discovery(&self, notice: &DiscoveryNotice, revision: Revision) {
        self.fan_out(PushMessage::DeviceDiscovery(notice.clone()), |handle| {
            revision <= handle.devices_seen
        })
        .await;
    }
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Failed to queue message")]
    SendFailed,
}
