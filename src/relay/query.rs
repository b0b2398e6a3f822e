//! Query API
//!
//! Side-effect-free reads over the registry and the latest-reading store,
//! used by the HTTP surface and by polling clients.

use std::sync::Arc;

use super::readings::LatestReadingStore;
use super::registry::DeviceRegistry;
use super::types::{Device, Reading};

#[derive(Debug, Clone)]
pub struct QueryApi {
    registry: Arc<DeviceRegistry>,
    readings: Arc<LatestReadingStore>,
}

impl QueryApi {
    pub fn new(registry: Arc<DeviceRegistry>, readings: Arc<LatestReadingStore>) -> Self {
        Self { registry, readings }
    }

    /// Full registry snapshot
    pub async fn list_devices(&self) -> Vec<Device> {
        self.registry.list().await
    }

    /// Latest reading of a device
    ///
    /// `None` covers both unknown ids and known devices that have not reported
    /// yet; neither is an error.
    pub async fn get_latest(&self, device_id: &str) -> Option<Reading> {
        self.readings.get(device_id).await
    }

    /// Latest reading of every device that has ever reported
    pub async fn list_latest(&self) -> Vec<Reading> {
        self.readings.list().await
    }

    pub async fn device_count(&self) -> usize {
        self.registry.len().await
    }

    pub async fn reading_count(&self) -> usize {
        self.readings.len().await
    }
}
