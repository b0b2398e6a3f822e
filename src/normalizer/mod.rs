//! Event Normalizer
//!
//! Turns raw broker payloads into typed events and applies them:
//!
//! - **event**: `RelayEvent` sum type and schema-checked decoding
//! - **engine**: `EventNormalizer`, which updates the stores and emits to the sink
//! - **error**: `DecodeError`
//!
//! ```text
//! (topic kind, bytes) → RelayEvent::decode → EventNormalizer::apply → stores + EventSink
//! ```

pub mod engine;
pub mod error;
pub mod event;

pub use engine::{EventNormalizer, Outcome};
pub use error::{DecodeError, DecodeResult};
pub use event::{normalize_timestamp, Discovery, RelayEvent, StatusUpdate, TopicKind, MILLIS_THRESHOLD};
