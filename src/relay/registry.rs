//! Device Registry
//!
//! In-memory map of device id → `Device`. A device is inserted at most once;
//! later sightings only touch `last_seen` and `status`. Nothing is ever evicted.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{Device, Revision};

/// Result of recording a sighting from a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// Device was already registered; `last_seen` was updated
    Touched,
    /// Device was unknown and has been registered with defaults
    Registered,
}

/// Owned store of known devices
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    inner: RwLock<Devices>,
}

#[derive(Debug, Default)]
struct Devices {
    by_id: HashMap<String, Device>,
    /// Bumped on every insertion
    revision: Revision,
}

impl Devices {
    fn insert(&mut self, device: Device) -> Revision {
        self.revision += 1;
        self.by_id.insert(device.id.clone(), device);
        self.revision
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device unless its id is already present
    ///
    /// Returns the insertion's revision, or `None` when the id was already
    /// present. An existing entry is left untouched, including its
    /// `discovered_at`.
    pub async fn insert_if_absent(&self, device: Device) -> Option<Revision> {
        let mut devices = self.inner.write().await;
        if devices.by_id.contains_key(&device.id) {
            return None;
        }
        Some(devices.insert(device))
    }

    /// Update `last_seen`, registering the device with defaults if unknown
    pub async fn record_sighting(&self, id: &str, now: DateTime<Utc>) -> Sighting {
        let mut devices = self.inner.write().await;
        match devices.by_id.get_mut(id) {
            Some(device) => {
                device.last_seen = now;
                Sighting::Touched
            }
            None => {
                devices.insert(Device::new(id, now));
                Sighting::Registered
            }
        }
    }

    /// Update status and `last_seen` of a known device
    ///
    /// Returns `false` (and changes nothing) when the id is unknown.
    pub async fn update_status(&self, id: &str, status: &str, now: DateTime<Utc>) -> bool {
        let mut devices = self.inner.write().await;
        match devices.by_id.get_mut(id) {
            Some(device) => {
                device.status = status.to_string();
                device.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Get a copy of a device
    pub async fn get(&self, id: &str) -> Option<Device> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    /// Snapshot of all devices, in no particular order
    pub async fn list(&self) -> Vec<Device> {
        self.snapshot().await.1
    }

    /// All devices together with the revision they reflect
    ///
    /// Every insertion with a revision at or below the returned one is in the
    /// list.
    pub async fn snapshot(&self) -> (Revision, Vec<Device>) {
        let devices = self.inner.read().await;
        (devices.revision, devices.by_id.values().cloned().collect())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_once() {
        let registry = DeviceRegistry::new();
        let first = Utc::now();
        let later = first + Duration::seconds(30);

        assert_eq!(registry.insert_if_absent(Device::new("box-1", first)).await, Some(1));
        assert_eq!(registry.insert_if_absent(Device::new("box-1", later).name("Other")).await, None);

        let device = registry.get("box-1").await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert_eq!(device.discovered_at, first);
        assert_eq!(device.name, "Marine Box box-1");
    }

    #[tokio::test]
    async fn test_record_sighting() {
        let registry = DeviceRegistry::new();
        let first = Utc::now();
        let later = first + Duration::seconds(5);

        assert_eq!(registry.record_sighting("box-2", first).await, Sighting::Registered);
        assert_eq!(registry.record_sighting("box-2", later).await, Sighting::Touched);

        let device = registry.get("box-2").await.unwrap();
        assert_eq!(device.discovered_at, first);
        assert_eq!(device.last_seen, later);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_revision_counts_insertions() {
        let registry = DeviceRegistry::new();
        let now = Utc::now();
        assert_eq!(registry.snapshot().await.0, 0);

        registry.insert_if_absent(Device::new("a", now)).await;
        registry.record_sighting("b", now).await;
        registry.record_sighting("b", now).await;
        registry.update_status("a", "offline", now).await;

        let (revision, devices) = registry.snapshot().await;
        assert_eq!(revision, 2);
        assert_eq!(devices.len(), 2);
        assert_eq!(registry.insert_if_absent(Device::new("c", now)).await, Some(3));
    }

    #[tokio::test]
    async fn test_status_for_unknown_device() {
        let registry = DeviceRegistry::new();
        assert!(!registry.update_status("ghost", "offline", Utc::now()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_status_update() {
        let registry = DeviceRegistry::new();
        let first = Utc::now();
        let later = first + Duration::minutes(1);
        registry.insert_if_absent(Device::new("box-3", first)).await;

        assert!(registry.update_status("box-3", "maintenance", later).await);

        let device = registry.get("box-3").await.unwrap();
        assert_eq!(device.status, "maintenance");
        assert_eq!(device.last_seen, later);
        assert_eq!(device.discovered_at, first);
    }
}
