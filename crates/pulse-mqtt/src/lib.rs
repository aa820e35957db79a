//! Thin MQTT client abstraction shared by the ingest service's device
//! subscriber and the notify service's MQTT channel sender.
//!
//! - `Channel` — publish/subscribe trait, mockable in tests without a
//!   live broker.
//! - `MqttClient` — `rumqttc`-backed implementation.
//! - `MockChannel` — in-memory implementation for unit/integration tests.
//! - `classify` — turns a raw MQTT publish into a typed `IncomingMessage`
//!   using `pulse_protocol`'s topic grammar.

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod mock;
pub mod tls;

pub use channel::{Channel, MqttClient};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult};
pub use handler::{IncomingMessage, classify};
pub use mock::MockChannel;
