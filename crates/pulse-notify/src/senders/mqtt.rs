//! MQTT channel sender: publishes the alert envelope back out over MQTT,
//! reusing `pulse_mqtt`'s `Channel` trait — the same publish-with-QoS-1
//! code path the ingest subscriber's connection type exposes
//! (`spec.md` §4.5, §6).
//!
//! Topic is resolved from the fixed template
//! `{tenant_id}/{device_id}/{severity}/{alert_type}/{alert_id}/{site_id}`;
//! `site_id` falls back to `"-"` when the alert carries none.
//!
//! `pulse_mqtt::Channel::publish` queues the publish with the client and
//! returns once `rumqttc` has accepted it onto the outgoing queue — the
//! PUBACK itself arrives on the driven `EventLoop`, which this sender
//! doesn't have access to behind the shared trait. We treat a successful
//! enqueue within the configured timeout as success and anything else as
//! transient, and note the PUBACK-wait gap in `DESIGN.md`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::QoS;
use serde::Deserialize;

use pulse_mqtt::Channel;
use pulse_protocol::channel::{AlertPayload, SendOutcome};

use crate::senders::Sender;

#[derive(Debug, Deserialize)]
struct MqttChannelConfig {
    #[serde(default)]
    site_id: Option<String>,
}

pub struct MqttSender {
    channel: Arc<dyn Channel>,
    publish_timeout: Duration,
}

impl MqttSender {
    pub fn new(channel: Arc<dyn Channel>, publish_timeout: Duration) -> Self {
        Self { channel, publish_timeout }
    }
}

/// Build the outbound alert topic from the fixed template.
pub fn alert_topic(payload: &AlertPayload, site_id: Option<&str>) -> String {
    format!(
        "{}/{}/{}/{}/{}/{}",
        payload.tenant_id,
        payload.device_id,
        payload.severity,
        payload.alert_type,
        payload.alert_id,
        site_id.unwrap_or("-"),
    )
}

#[async_trait]
impl Sender for MqttSender {
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome {
        let config: MqttChannelConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(err) => return SendOutcome::Permanent(format!("invalid mqtt channel config: {err}")),
        };

        let topic = alert_topic(payload, config.site_id.as_deref().or(payload.site_id.as_deref()));
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(err) => return SendOutcome::Permanent(format!("payload serialization failed: {err}")),
        };

        let publish = self.channel.publish(&topic, &body, QoS::AtLeastOnce);
        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(Ok(())) => SendOutcome::Ok,
            Ok(Err(err)) => SendOutcome::Transient(err.to_string()),
            Err(_) => SendOutcome::Transient("mqtt publish timed out waiting for puback".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_mqtt::MockChannel;
    use uuid::Uuid;

    fn sample_payload() -> AlertPayload {
        AlertPayload {
            alert_id: Uuid::nil(),
            tenant_id: "acme".into(),
            device_id: "dev-1".into(),
            severity: 4,
            alert_type: "temp_high".into(),
            summary: "temp too high".into(),
            details: serde_json::json!({}),
            triggered_at: Utc::now(),
            site_id: Some("site-a".into()),
            _test: None,
        }
    }

    #[test]
    fn topic_uses_template_with_site_id() {
        let topic = alert_topic(&sample_payload(), Some("site-a"));
        assert_eq!(topic, format!("acme/dev-1/4/temp_high/{}/site-a", Uuid::nil()));
    }

    #[test]
    fn topic_falls_back_to_dash_without_site() {
        let topic = alert_topic(&sample_payload(), None);
        assert!(topic.ends_with("/-"));
    }

    #[tokio::test]
    async fn send_publishes_to_resolved_topic() {
        let mock = Arc::new(MockChannel::new());
        let sender = MqttSender::new(mock.clone(), Duration::from_secs(10));
        let outcome = sender.send(&sample_payload(), &serde_json::json!({})).await;
        assert_eq!(outcome, SendOutcome::Ok);
        let published = mock.last_published().unwrap();
        assert_eq!(published.topic, format!("acme/dev-1/4/temp_high/{}/site-a", Uuid::nil()));
    }
}
