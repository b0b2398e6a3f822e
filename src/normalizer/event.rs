//! Typed event model
//!
//! Every broker payload decodes into exactly one `RelayEvent` variant or a
//! `DecodeError`; partially populated events never exist.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::{DecodeError, DecodeResult};
use crate::relay::Reading;

/// Timestamps below this are taken to be seconds rather than milliseconds
///
/// Such values are replaced with the relay's receipt time, not converted.
pub const MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Which logical topic a message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    SensorData,
    DeviceDiscovery,
    DeviceStatus,
}

impl std::fmt::Display for TopicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicKind::SensorData => write!(f, "sensor-data"),
            TopicKind::DeviceDiscovery => write!(f, "device-discovery"),
            TopicKind::DeviceStatus => write!(f, "device-status"),
        }
    }
}

/// A decoded, validated broker event
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Full set of measurements from a device
    Reading(Reading),
    /// A device announcing itself
    Discovery(Discovery),
    /// A device reporting its operational status
    Status(StatusUpdate),
}

/// Discovery announcement
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Discovery {
    pub device_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_location: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Status report
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdate {
    pub device_id: String,
    pub status: String,
}

/// Wire shape of a sensor-data payload
///
/// Devices send the id as either `device_id` or `boxId`. Acidity and algae
/// also have two spellings each; when both appear the dashboard spelling
/// (`pH`, `blue_green_algae`) wins.
#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default, rename = "boxId")]
    box_id: Option<String>,
    #[serde(default)]
    timestamp: Option<f64>,
    temperature: f64,
    #[serde(default, rename = "pH")]
    ph: Option<f64>,
    #[serde(default, rename = "ph")]
    ph_lower: Option<f64>,
    dissolved_oxygen: f64,
    turbidity: f64,
    flow_rate: f64,
    co2: f64,
    tds: f64,
    salinity: f64,
    #[serde(default, rename = "blue_green_algae")]
    blue_green_algae: Option<f64>,
    #[serde(default)]
    algae: Option<f64>,
}

impl RelayEvent {
    /// Decode a raw payload received on a topic of the given kind
    ///
    /// `received_at` stands in for reading timestamps that are missing or
    /// look like seconds.
    pub fn decode(kind: TopicKind, payload: &[u8], received_at: DateTime<Utc>) -> DecodeResult<Self> {
        match kind {
            TopicKind::SensorData => {
                let raw: RawReading = serde_json::from_slice(payload)?;
                let device_id = raw
                    .device_id
                    .or(raw.box_id)
                    .filter(|id| !id.trim().is_empty())
                    .ok_or(DecodeError::MissingField("device_id"))?;
                let ph = raw.ph.or(raw.ph_lower).ok_or(DecodeError::MissingField("pH"))?;
                let algae = raw
                    .blue_green_algae
                    .or(raw.algae)
                    .ok_or(DecodeError::MissingField("blue_green_algae"))?;

                Ok(RelayEvent::Reading(Reading {
                    timestamp: normalize_timestamp(raw.timestamp, received_at),
                    device_id,
                    temperature: raw.temperature,
                    ph,
                    dissolved_oxygen: raw.dissolved_oxygen,
                    turbidity: raw.turbidity,
                    flow_rate: raw.flow_rate,
                    co2: raw.co2,
                    tds: raw.tds,
                    salinity: raw.salinity,
                    algae,
                }))
            }
            TopicKind::DeviceDiscovery => {
                let discovery: Discovery = serde_json::from_slice(payload)?;
                require_id(&discovery.device_id)?;
                Ok(RelayEvent::Discovery(discovery))
            }
            TopicKind::DeviceStatus => {
                let update: StatusUpdate = serde_json::from_slice(payload)?;
                require_id(&update.device_id)?;
                Ok(RelayEvent::Status(update))
            }
        }
    }

    /// Device the event refers to
    pub fn device_id(&self) -> &str {
        match self {
            RelayEvent::Reading(reading) => &reading.device_id,
            RelayEvent::Discovery(discovery) => &discovery.device_id,
            RelayEvent::Status(update) => &update.device_id,
        }
    }
}

fn require_id(id: &str) -> DecodeResult<()> {
    if id.trim().is_empty() {
        return Err(DecodeError::MissingField("device_id"));
    }
    Ok(())
}

/// Normalize a reading timestamp to epoch milliseconds
///
/// Values under `MILLIS_THRESHOLD` (and absent values) become the receipt
/// time. This does not convert seconds to milliseconds.
pub fn normalize_timestamp(timestamp: Option<f64>, received_at: DateTime<Utc>) -> i64 {
    match timestamp {
        Some(ts) if ts >= MILLIS_THRESHOLD => ts as i64,
        _ => received_at.timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_READING: &str = r#"{
        "device_id": "box-7", "timestamp": 1700000000000,
        "temperature": 24.1, "pH": 8.1, "dissolved_oxygen": 7.9, "turbidity": 1.2,
        "flow_rate": 12.5, "co2": 410.0, "tds": 320.0, "salinity": 35.0,
        "blue_green_algae": 0.4
    }"#;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_750_000_000_123).unwrap()
    }

    #[test]
    fn test_decode_full_reading() {
        let event = RelayEvent::decode(TopicKind::SensorData, FULL_READING.as_bytes(), now()).unwrap();
        match event {
            RelayEvent::Reading(reading) => {
                assert_eq!(reading.device_id, "box-7");
                assert_eq!(reading.timestamp, 1_700_000_000_000);
                assert_eq!(reading.temperature, 24.1);
                assert_eq!(reading.ph, 8.1);
                assert_eq!(reading.algae, 0.4);
            }
            other => panic!("Expected Reading, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_reading_aliases() {
        let json = r#"{"boxId": "box-3", "timestamp": 1700000000000, "temperature": 20,
            "ph": 7, "dissolved_oxygen": 8, "turbidity": 1, "flow_rate": 2, "co2": 3,
            "tds": 4, "salinity": 5, "algae": 6}"#;
        let event = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now()).unwrap();
        assert_eq!(event.device_id(), "box-3");
        match event {
            RelayEvent::Reading(reading) => {
                assert_eq!(reading.ph, 7.0);
                assert_eq!(reading.algae, 6.0);
            }
            other => panic!("Expected Reading, got {:?}", other),
        }
    }

    #[test]
    fn test_both_spellings_prefer_dashboard_names() {
        let json = FULL_READING
            .replace(r#""pH": 8.1,"#, r#""pH": 8.1, "ph": 6.5,"#)
            .replace(r#""blue_green_algae": 0.4"#, r#""blue_green_algae": 0.4, "algae": 9.9"#);
        let event = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now()).unwrap();
        match event {
            RelayEvent::Reading(reading) => {
                assert_eq!(reading.ph, 8.1);
                assert_eq!(reading.algae, 0.4);
            }
            other => panic!("Expected Reading, got {:?}", other),
        }
    }

    #[test]
    fn test_reading_without_ph_rejected() {
        let json = FULL_READING.replace(r#""pH": 8.1,"#, "");
        let result = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now());
        assert!(matches!(result, Err(DecodeError::MissingField("pH"))));

        let json = FULL_READING.replace(r#""blue_green_algae": 0.4"#, r#""unused": 0"#);
        let result = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now());
        assert!(matches!(result, Err(DecodeError::MissingField("blue_green_algae"))));
    }

    #[test]
    fn test_seconds_timestamp_becomes_receipt_time() {
        let json = FULL_READING.replace("1700000000000", "1000");
        let event = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now()).unwrap();
        match event {
            RelayEvent::Reading(reading) => assert_eq!(reading.timestamp, 1_750_000_000_123),
            other => panic!("Expected Reading, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_timestamp_becomes_receipt_time() {
        let json = FULL_READING.replace(r#""timestamp": 1700000000000,"#, "");
        let event = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now()).unwrap();
        match event {
            RelayEvent::Reading(reading) => assert_eq!(reading.timestamp, 1_750_000_000_123),
            other => panic!("Expected Reading, got {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_reading_rejected() {
        let json = FULL_READING.replace(r#""turbidity": 1.2,"#, "");
        let err = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert!(err.to_string().contains("turbidity"));
    }

    #[test]
    fn test_non_numeric_measurement_rejected() {
        let json = FULL_READING.replace("24.1", r#""warm""#);
        let result = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now());
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_reading_without_id_rejected() {
        let json = FULL_READING.replace(r#""device_id": "box-7","#, "");
        let result = RelayEvent::decode(TopicKind::SensorData, json.as_bytes(), now());
        assert!(matches!(result, Err(DecodeError::MissingField("device_id"))));
    }

    #[test]
    fn test_garbage_rejected() {
        let result = RelayEvent::decode(TopicKind::DeviceStatus, b"\xff\xfe not json", now());
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_discovery() {
        let json = r#"{"device_id": "box-7", "device_name": "Reef A",
            "device_location": "Pier 3", "ip_address": "10.0.0.7"}"#;
        let event = RelayEvent::decode(TopicKind::DeviceDiscovery, json.as_bytes(), now()).unwrap();
        assert_eq!(
            event,
            RelayEvent::Discovery(Discovery {
                device_id: "box-7".to_string(),
                device_name: Some("Reef A".to_string()),
                device_location: Some("Pier 3".to_string()),
                ip_address: Some("10.0.0.7".to_string()),
            })
        );
    }

    #[test]
    fn test_decode_discovery_minimal() {
        let event =
            RelayEvent::decode(TopicKind::DeviceDiscovery, br#"{"device_id": "box-8"}"#, now()).unwrap();
        match event {
            RelayEvent::Discovery(discovery) => {
                assert!(discovery.device_name.is_none());
                assert!(discovery.ip_address.is_none());
            }
            other => panic!("Expected Discovery, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_status_blank_id() {
        let result = RelayEvent::decode(
            TopicKind::DeviceStatus,
            br#"{"device_id": " ", "status": "ok"}"#,
            now(),
        );
        assert!(matches!(result, Err(DecodeError::MissingField(_))));
    }

    #[test]
    fn test_normalize_timestamp_threshold() {
        let received = now();
        assert_eq!(normalize_timestamp(Some(999_999_999_999.0), received), 1_750_000_000_123);
        assert_eq!(normalize_timestamp(Some(1_000_000_000_000.0), received), 1_000_000_000_000);
        assert_eq!(normalize_timestamp(Some(-5.0), received), 1_750_000_000_123);
    }
}
