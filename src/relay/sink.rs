//! Delivery seam between the normalizer and whatever renders its output
//!
//! The broadcaster implements this to fan events out to dashboards; tests
//! plug in a recorder instead.

use async_trait::async_trait;

use super::types::{DiscoveryNotice, Reading, Revision};

/// Receives normalized events in emission order
///
/// Each event carries the revision of the store write that produced it, so a
/// sink that also serves store snapshots can tell whether a snapshot already
/// contains the event.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver a normalized reading stored at `revision` of the reading store
    async fn deliver_reading(&self, reading: &Reading, revision: Revision);

    /// Deliver a newly discovered device inserted at `revision` of the registry
    async fn deliver_discovery(&self, notice: &DiscoveryNotice, revision: Revision);
}
