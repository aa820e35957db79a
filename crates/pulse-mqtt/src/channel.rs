//! MQTT channel — async client wrapping `rumqttc::AsyncClient`.
//!
//! Used two ways in this workspace: ingest subscribes the device topic
//! filters and drives the event loop to receive telemetry/heartbeat/event
//! messages; notify's MQTT sender publishes alert payloads to a
//! per-alert topic. Both go through the same `Channel` trait so tests can
//! substitute `MockChannel`.

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use crate::tls;

/// Abstraction for MQTT publish/subscribe, mockable in tests without a
/// real broker.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()>;
}

/// MQTT client connected to the (external) broker as a service account.
///
/// Owns the `AsyncClient` for publishing/subscribing. The `EventLoop` is
/// returned separately from `new()` — the caller must drive it in a
/// spawned task via `eventloop.poll()`, reconnecting with backoff on error
/// (`spec.md` §4.2's failure taxonomy: "connection loss → reconnect with
/// exponential backoff, capped at 30s").
pub struct MqttClient {
    client: AsyncClient,
}

impl MqttClient {
    pub fn new(config: &MqttConfig) -> MqttResult<(Self, EventLoop)> {
        let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(std::time::Duration::from_secs(config.keepalive_secs.into()));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let transport = if config.use_tls {
            tls::load_tls_transport(config)?
        } else {
            tls::plaintext_transport()
        };
        options.set_transport(transport);

        let (client, eventloop) = AsyncClient::new(options, 256);
        Ok((Self { client }, eventloop))
    }

    /// Subscribe every filter in `filters` at QoS 1, per `spec.md` §6.
    pub async fn subscribe_all(&self, filters: &[&str]) -> MqttResult<()> {
        for filter in filters {
            self.subscribe(filter, QoS::AtLeastOnce).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for MqttClient {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.client
            .subscribe(filter, qos)
            .await
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }
}
