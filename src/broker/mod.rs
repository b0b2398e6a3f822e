//! Broker Client
//!
//! MQTT subscription side of the relay:
//!
//! - **topics**: `TopicSet`, the configured topic names and their kinds
//! - **client**: `BrokerClient`, the subscription loop, and `BrokerStatus`

pub mod client;
pub mod topics;

pub use client::{BrokerClient, BrokerError, BrokerStatus};
pub use topics::TopicSet;
