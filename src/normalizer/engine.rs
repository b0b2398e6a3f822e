//! Event Normalizer
//!
//! Applies decoded events to the registry and latest-reading store, then
//! emits what dashboards need through the `EventSink`. Stores are injected,
//! so the whole pipeline runs without a broker.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::event::{Discovery, RelayEvent, StatusUpdate, TopicKind};
use crate::relay::{Device, DeviceRegistry, EventSink, LatestReadingStore, Reading, Sighting};

/// What applying an event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reading stored and broadcast; `new_device` if the reading registered its device
    ReadingStored { new_device: bool },
    /// Device registered and announced
    DeviceDiscovered,
    /// Discovery for a device already registered; nothing changed
    DuplicateDiscovery,
    /// Status and last_seen updated
    StatusUpdated,
    /// Status for a device never seen; dropped
    UnknownDevice,
    /// Payload could not be decoded; dropped
    Rejected,
}

pub struct EventNormalizer {
    registry: Arc<DeviceRegistry>,
    readings: Arc<LatestReadingStore>,
    sink: Arc<dyn EventSink>,
}

impl EventNormalizer {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        readings: Arc<LatestReadingStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            readings,
            sink,
        }
    }

    /// Decode and apply one broker message
    ///
    /// Malformed payloads are logged and dropped; they never fail the caller.
    pub async fn handle_message(
        &self,
        kind: TopicKind,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Outcome {
        match RelayEvent::decode(kind, payload, received_at) {
            Ok(event) => self.apply(event, received_at).await,
            Err(e) => {
                tracing::warn!(
                    topic = %kind,
                    payload_len = payload.len(),
                    error = %e,
                    "Dropping malformed broker message"
                );
                Outcome::Rejected
            }
        }
    }

    /// Apply a decoded event at time `now`
    pub async fn apply(&self, event: RelayEvent, now: DateTime<Utc>) -> Outcome {
        match event {
            RelayEvent::Reading(reading) => self.apply_reading(reading, now).await,
            RelayEvent::Discovery(discovery) => self.apply_discovery(discovery, now).await,
            RelayEvent::Status(update) => self.apply_status(update, now).await,
        }
    }

    async fn apply_reading(&self, reading: Reading, now: DateTime<Utc>) -> Outcome {
        let sighting = self.registry.record_sighting(&reading.device_id, now).await;
        let revision = self.readings.upsert(reading.clone()).await;

        tracing::debug!(
            device_id = %reading.device_id,
            temperature = reading.temperature,
            ph = reading.ph,
            dissolved_oxygen = reading.dissolved_oxygen,
            "Sensor reading stored"
        );

        self.sink.deliver_reading(&reading, revision).await;

        Outcome::ReadingStored {
            new_device: sighting == Sighting::Registered,
        }
    }

    async fn apply_discovery(&self, discovery: Discovery, now: DateTime<Utc>) -> Outcome {
        let mut device = Device::new(discovery.device_id, now);
        if let Some(name) = discovery.device_name {
            device = device.name(name);
        }
        if let Some(location) = discovery.device_location {
            device = device.location(location);
        }
        if let Some(address) = discovery.ip_address {
            device = device.ip_address(address);
        }

        let notice = device.notice();
        let Some(revision) = self.registry.insert_if_absent(device).await else {
            tracing::debug!(device_id = %notice.box_id, "Repeated discovery ignored");
            return Outcome::DuplicateDiscovery;
        };

        tracing::info!(
            device_id = %notice.box_id,
            name = %notice.name,
            location = %notice.location,
            "New device discovered"
        );

        self.sink.deliver_discovery(&notice, revision).await;
        Outcome::DeviceDiscovered
    }

    async fn apply_status(&self, update: StatusUpdate, now: DateTime<Utc>) -> Outcome {
        if self
            .registry
            .update_status(&update.device_id, &update.status, now)
            .await
        {
            tracing::debug!(device_id = %update.device_id, status = %update.status, "Device status updated");
            Outcome::StatusUpdated
        } else {
            tracing::debug!(device_id = %update.device_id, "Status for unknown device ignored");
            Outcome::UnknownDevice
        }
    }
}
