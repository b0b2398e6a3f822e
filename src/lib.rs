//! # Polychaeta Relay
//!
//! MQTT to WebSocket fan-out bridge for the Polychaeta marine sensor
//! dashboard. Subscribes to sensor, discovery and status topics, keeps the
//! known devices and their latest readings in memory, pushes normalized
//! events to every connected dashboard, and serves the same state over a
//! small HTTP query API.
//!
//! ## Modules
//!
//! - [`relay`]: Device registry, latest-reading store, query facade
//! - [`normalizer`]: Typed event decoding and application
//! - [`websocket`]: Fan-out broadcaster and push protocol
//! - [`broker`]: MQTT subscription loop
//! - [`api`]: HTTP query API with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polychaeta_relay::normalizer::{EventNormalizer, TopicKind};
//! use polychaeta_relay::relay::{DeviceRegistry, EventSink, LatestReadingStore, QueryApi};
//! use polychaeta_relay::websocket::{ConnectionHub, HubConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(DeviceRegistry::new());
//!     let readings = Arc::new(LatestReadingStore::new());
//!     let hub = Arc::new(ConnectionHub::new(
//!         HubConfig::default(),
//!         Arc::clone(&registry),
//!         Arc::clone(&readings),
//!     ));
//!     let normalizer = EventNormalizer::new(
//!         Arc::clone(&registry),
//!         Arc::clone(&readings),
//!         hub as Arc<dyn EventSink>,
//!     );
//!
//!     let payload = br#"{"device_id": "box-7", "device_name": "Reef A"}"#;
//!     normalizer
//!         .handle_message(TopicKind::DeviceDiscovery, payload, chrono::Utc::now())
//!         .await;
//!
//!     let query = QueryApi::new(registry, readings);
//!     println!("{} devices known", query.list_devices().await.len());
//! }
//! ```

pub mod api;
pub mod broker;
pub mod config;
pub mod logging;
pub mod normalizer;
pub mod relay;
pub mod websocket;

// Re-export top-level types for convenience
pub use relay::{
    Device, DeviceRegistry, DiscoveryNotice, EventSink, LatestReadingStore, QueryApi, Reading,
};

pub use normalizer::{DecodeError, EventNormalizer, Outcome, RelayEvent, TopicKind};

pub use api::{build_push_router, build_router, serve, ApiError, AppState};

pub use broker::{BrokerClient, BrokerError, BrokerStatus, TopicSet};

pub use websocket::{websocket_handler, ConnectionHub, HubConfig, HubError, PushMessage};

pub use config::{
    ApiConfig, BrokerConfig, Config, ConfigError, LoadedConfig, LogFormat, LoggingConfig,
    WebSocketConfig,
};
