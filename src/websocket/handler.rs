//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle:
//! Connecting (upgrade) → Open (registered with the hub, burst queued) → Closed.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::hub::ConnectionHub;
use super::messages::PushMessage;
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for dashboard connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.ws_hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>) {
    let (mut sender, mut receiver) = socket.split();

    let subscription = match hub.connect().await {
        Ok(sub) => sub,
        Err(e) => {
            tracing::warn!(error = %e, "Refusing dashboard connection");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let connection_id = subscription.id;
    let mut rx = subscription.receiver;
    let send_timeout = hub.config().send_timeout;
    let conn_id_for_send = connection_id.clone();

    // Task to forward queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if !send_message(&mut sender, &msg, send_timeout, &conn_id_for_send).await {
                break;
            }
        }
        // A peer that stopped reading would block the close handshake too
        let _ = tokio::time::timeout(send_timeout, sender.close()).await;
    });

    let conn_id_for_recv = connection_id.clone();

    // Task to watch the socket for close or errors; the protocol is push-only
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %conn_id_for_recv, "Client requested close");
                    break;
                }
                Ok(Message::Text(text)) => {
                    tracing::trace!(
                        connection_id = %conn_id_for_recv,
                        len = text.len(),
                        "Ignoring client message"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.disconnect(&connection_id).await;
}

/// Serialize and write one message within `timeout`
///
/// Returns false if the connection should be closed.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &PushMessage,
    timeout: Duration,
    connection_id: &str,
) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, kind = message.kind(), "Failed to serialize message");
            return true;
        }
    };

    match tokio::time::timeout(timeout, sender.send(Message::Text(text))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
            false
        }
        Err(_) => {
            tracing::warn!(
                connection_id = %connection_id,
                timeout_ms = timeout.as_millis() as u64,
                "WebSocket send timed out"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_push_router;
    use crate::broker::BrokerStatus;
    use crate::relay::{DeviceRegistry, LatestReadingStore, QueryApi, Reading};
    use crate::websocket::HubConfig;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite};

    async fn spawn_push_server(config: HubConfig) -> (SocketAddr, Arc<ConnectionHub>) {
        let registry = Arc::new(DeviceRegistry::new());
        let readings = Arc::new(LatestReadingStore::new());
        let hub = Arc::new(ConnectionHub::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&readings),
        ));
        let state = AppState::new(
            QueryApi::new(registry, readings),
            Arc::clone(&hub),
            BrokerStatus::default(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_push_router(Arc::new(state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (addr, hub)
    }

    async fn wait_for_connections(hub: &ConnectionHub, expected: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while hub.connection_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection count did not settle");
    }

    fn bulky_reading(size: usize) -> Reading {
        Reading {
            timestamp: 1_700_000_000_000,
            device_id: "x".repeat(size),
            temperature: 20.0,
            ph: 8.0,
            dissolved_oxygen: 7.5,
            turbidity: 1.0,
            flow_rate: 10.0,
            co2: 400.0,
            tds: 300.0,
            salinity: 35.0,
            algae: 0.2,
        }
    }

    #[tokio::test]
    async fn test_burst_delivered_and_close_unregisters() {
        let (addr, hub) = spawn_push_server(HubConfig::default()).await;

        let (mut client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let json: serde_json::Value = match first {
            tungstenite::Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("Expected text frame, got {:?}", other),
        };
        assert_eq!(json["type"], "discovered_devices");
        assert_eq!(hub.connection_count().await, 1);

        client.close(None).await.unwrap();
        wait_for_connections(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_refused_connection_gets_close_frame() {
        let config = HubConfig {
            max_connections: 0,
            ..HubConfig::default()
        };
        let (addr, hub) = spawn_push_server(config).await;

        let (mut client, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap();

        assert!(matches!(frame, Some(Ok(tungstenite::Message::Close(_)))));
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_reader_that_stops_reading_is_dropped_after_send_timeout() {
        let config = HubConfig {
            queue_capacity: 1000,
            send_timeout: Duration::from_millis(100),
            ..HubConfig::default()
        };
        let (addr, hub) = spawn_push_server(config).await;

        // Connected but never polled again, so socket buffers fill up
        let (_client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        wait_for_connections(&hub, 1).await;

        // Well past loopback buffer sizes while staying under the queue capacity
        let reading = bulky_reading(64 * 1024);
        for _ in 0..600 {
            hub.broadcast(PushMessage::SensorData(reading.clone())).await;
        }

        wait_for_connections(&hub, 0).await;
    }
}
