//! Core data types for the relay
//!
//! - `Device`: a sensing unit known to the registry
//! - `Reading`: one normalized set of measurements from a device
//! - `DiscoveryNotice`: the record pushed to dashboards when a device first appears
//!
//! Serialized field names follow what the dashboard consumes (`boxId`, `pH`,
//! `blue_green_algae`), not the names devices publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status assigned to a device when it is first registered
pub const STATUS_ACTIVE: &str = "active";

/// Location used when a device does not announce one
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Write counter of a store; each insert gets the next value
///
/// `0` is the state before any write.
pub type Revision = u64;

/// A device tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    /// Stable device identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Installation location
    pub location: String,
    /// Network address reported at discovery
    pub ip_address: Option<String>,
    /// First time the relay saw this device
    pub discovered_at: DateTime<Utc>,
    /// Last time any event from this device was processed
    pub last_seen: DateTime<Utc>,
    /// Last reported operational status
    pub status: String,
}

impl Device {
    /// Create a freshly discovered device
    ///
    /// `discovered_at` and `last_seen` are both set to `now`.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let id = id.into();
        Self {
            name: default_name(&id),
            id,
            location: UNKNOWN_LOCATION.to_string(),
            ip_address: None,
            discovered_at: now,
            last_seen: now,
            status: STATUS_ACTIVE.to_string(),
        }
    }

    /// Builder method: set the display name (blank keeps the generated label)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.name = name;
        }
        self
    }

    /// Builder method: set the location (blank keeps "Unknown")
    pub fn location(mut self, location: impl Into<String>) -> Self {
        let location = location.into();
        if !location.trim().is_empty() {
            self.location = location;
        }
        self
    }

    /// Builder method: set the network address
    pub fn ip_address(mut self, address: impl Into<String>) -> Self {
        self.ip_address = Some(address.into());
        self
    }

    /// Notice sent to dashboards announcing this device
    pub fn notice(&self) -> DiscoveryNotice {
        DiscoveryNotice {
            box_id: self.id.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }
}

/// Generated label for devices that never announced a name
pub fn default_name(id: &str) -> String {
    format!("Marine Box {}", id)
}

/// The latest normalized reading of a device
///
/// Immutable once built; the store replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Milliseconds since epoch
    pub timestamp: i64,
    /// Device that produced the reading
    #[serde(rename = "boxId")]
    pub device_id: String,
    /// Water temperature (°C)
    pub temperature: f64,
    /// Acidity index
    #[serde(rename = "pH")]
    pub ph: f64,
    /// Dissolved oxygen (mg/L)
    pub dissolved_oxygen: f64,
    /// Turbidity (NTU)
    pub turbidity: f64,
    /// Flow rate (L/min)
    pub flow_rate: f64,
    /// CO2 concentration (ppm)
    pub co2: f64,
    /// Total dissolved solids (ppm)
    pub tds: f64,
    /// Salinity (ppt)
    pub salinity: f64,
    /// Blue-green algae concentration
    #[serde(rename = "blue_green_algae")]
    pub algae: f64,
}

/// Record pushed to dashboards for a newly discovered device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryNotice {
    #[serde(rename = "boxId")]
    pub box_id: String,
    pub name: String,
    pub location: String,
}
