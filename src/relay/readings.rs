//! Latest-Reading Store
//!
//! Keeps exactly one reading per device id. New readings replace the previous
//! one wholesale; history is not retained.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{Reading, Revision};

#[derive(Debug, Default)]
pub struct LatestReadingStore {
    inner: RwLock<Readings>,
}

#[derive(Debug, Default)]
struct Readings {
    by_device: HashMap<String, Reading>,
    /// Bumped on every upsert
    revision: Revision,
}

impl LatestReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a reading as the latest for its device
    ///
    /// Returns the revision of this write.
    pub async fn upsert(&self, reading: Reading) -> Revision {
        let mut readings = self.inner.write().await;
        readings.revision += 1;
        readings.by_device.insert(reading.device_id.clone(), reading);
        readings.revision
    }

    /// Latest reading of a device, `None` if it never reported
    pub async fn get(&self, device_id: &str) -> Option<Reading> {
        self.inner.read().await.by_device.get(device_id).cloned()
    }

    /// One reading per device that has reported, in no particular order
    pub async fn list(&self) -> Vec<Reading> {
        self.snapshot().await.1
    }

    /// All latest readings together with the revision they reflect
    ///
    /// A write at or below the returned revision is either in the list or
    /// replaced by a newer reading that is.
    pub async fn snapshot(&self) -> (Revision, Vec<Reading>) {
        let readings = self.inner.read().await;
        (readings.revision, readings.by_device.values().cloned().collect())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_device.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.by_device.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device_id: &str, temperature: f64) -> Reading {
        Reading {
            timestamp: 1_700_000_000_000,
            device_id: device_id.to_string(),
            temperature,
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
    async fn test_overwrite_keeps_one() {
        let store = LatestReadingStore::new();

        assert_eq!(store.upsert(reading("box-1", 20.0)).await, 1);
        assert_eq!(store.upsert(reading("box-1", 21.5)).await, 2);

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("box-1").await.unwrap().temperature, 21.5);
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let store = LatestReadingStore::new();
        store.upsert(reading("box-1", 22.0)).await;
        store.upsert(reading("box-1", 22.0)).await;

        assert_eq!(store.get("box-1").await, Some(reading("box-1", 22.0)));
    }

    #[tokio::test]
    async fn test_missing_device() {
        let store = LatestReadingStore::new();
        assert!(store.get("box-9").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_one_per_device() {
        let store = LatestReadingStore::new();
        store.upsert(reading("a", 1.0)).await;
        store.upsert(reading("b", 2.0)).await;
        store.upsert(reading("a", 3.0)).await;

        let (revision, list) = store.snapshot().await;
        let mut ids: Vec<_> = list.into_iter().map(|r| r.device_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(revision, 3);
    }
}
