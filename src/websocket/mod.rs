//! WebSocket Real-Time Streaming
//!
//! Pushes normalized events to dashboard clients.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: the fan-out broadcaster; tracks open connections
//! - **Handler**: handles WebSocket upgrade and the per-connection send loop
//! - **Messages**: the `{type, data}` push protocol
//!
//! ## Protocol
//!
//! On connect a client receives a catch-up burst: one `discovered_devices`
//! frame, then one `sensor_data` frame per device with a stored reading.
//! After that it receives every `sensor_data` and `device_discovery` event
//! in emission order.
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:3002');
//! ws.onmessage = (event) => {
//!   const { type, data } = JSON.parse(event.data);
//!   console.log(type, data);
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{ConnectionHandle, ConnectionHub, ConnectionId, HubConfig, HubError, Subscription};
pub use messages::PushMessage;
