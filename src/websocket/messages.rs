//! WebSocket Message Types
//!
//! Push protocol from the relay to dashboards. Every frame is a JSON object
//! `{"type": ..., "data": ...}`.

use serde::Serialize;

use crate::relay::{Device, DiscoveryNotice, Reading};

/// Messages sent from the relay to dashboards
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushMessage {
    /// A normalized reading
    SensorData(Reading),
    /// A device seen for the first time
    DeviceDiscovery(DiscoveryNotice),
    /// Every registered device; first frame of the catch-up burst
    DiscoveredDevices(Vec<Device>),
}

impl PushMessage {
    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::SensorData(_) => "sensor_data",
            PushMessage::DeviceDiscovery(_) => "device_discovery",
            PushMessage::DiscoveredDevices(_) => "discovered_devices",
        }
    }
}
