//! Relay State
//!
//! The state the relay owns for its whole lifetime, rebuilt empty on restart:
//!
//! - **types**: `Device`, `Reading`, `DiscoveryNotice`
//! - **registry**: device id → device metadata
//! - **readings**: device id → latest reading
//! - **query**: read-only facade over both stores
//! - **sink**: `EventSink`, the seam the normalizer emits through
//!
//! ```text
//! Broker → EventNormalizer → {DeviceRegistry, LatestReadingStore} → EventSink (hub) → dashboards
//!                                         ↑
//!                                     QueryApi ← HTTP
//! ```

pub mod query;
pub mod readings;
pub mod registry;
pub mod sink;
pub mod types;

pub use query::QueryApi;
pub use readings::LatestReadingStore;
pub use registry::{DeviceRegistry, Sighting};
pub use sink::EventSink;
pub use types::{
    default_name, Device, DiscoveryNotice, Reading, Revision, STATUS_ACTIVE, UNKNOWN_LOCATION,
};
