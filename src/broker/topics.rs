//! Broker topic set
//!
//! Maps the three configured MQTT topic names onto their logical kinds.

use serde::Deserialize;

use crate::normalizer::TopicKind;

/// The topics the relay subscribes to
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TopicSet {
    #[serde(default = "default_sensor_data")]
    pub sensor_data: String,

    #[serde(default = "default_discovery")]
    pub discovery: String,

    #[serde(default = "default_status")]
    pub status: String,
}

fn default_sensor_data() -> String {
    "polychaeta/sensor/data".to_string()
}

fn default_discovery() -> String {
    "polychaeta/discovery".to_string()
}

fn default_status() -> String {
    "polychaeta/status".to_string()
}

impl Default for TopicSet {
    fn default() -> Self {
        Self {
            sensor_data: default_sensor_data(),
            discovery: default_discovery(),
            status: default_status(),
        }
    }
}

impl TopicSet {
    /// Logical kind of an inbound topic, `None` if it is not one of ours
    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        if topic == self.sensor_data {
            Some(TopicKind::SensorData)
        } else if topic == self.discovery {
            Some(TopicKind::DeviceDiscovery)
        } else if topic == self.status {
            Some(TopicKind::DeviceStatus)
        } else {
            None
        }
    }

    /// All topic names to subscribe to
    pub fn all(&self) -> [&str; 3] {
        [&self.sensor_data, &self.discovery, &self.status]
    }
}
