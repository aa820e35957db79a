//! Incoming message classification for ingest's MQTT event loop.
//!
//! Parses raw MQTT publishes into a typed `IncomingMessage` using
//! `pulse_protocol::topics::parse_topic`, so ingest dispatches on a
//! closed enum instead of re-matching topic strings.

use pulse_protocol::topics::{self, TopicKind};
use rumqttc::Publish;

/// A classified incoming MQTT message, still carrying the raw payload —
/// envelope validation (schema, size cap, tenant/device match) happens
/// downstream in `pulse-ingest`, not here.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Telemetry {
        tenant_id: String,
        device_id: String,
        payload: Vec<u8>,
    },
    Heartbeat {
        tenant_id: String,
        device_id: String,
        payload: Vec<u8>,
    },
    Event {
        tenant_id: String,
        device_id: String,
        payload: Vec<u8>,
    },
    /// Shadow reports and command acks are accepted per `spec.md` §6 but
    /// have no dedicated store; ingest persists them as `event` rows
    /// tagged with their originating topic kind (see `DESIGN.md`).
    ShadowOrAck {
        tenant_id: String,
        device_id: String,
        topic_kind: &'static str,
        payload: Vec<u8>,
    },
    /// Topic didn't match the grammar at all — not even a quarantine
    /// candidate, since it never resolved to a `(tenant, device)` pair.
    Unparseable { topic: String, payload: Vec<u8> },
}

pub fn classify(publish: &Publish) -> IncomingMessage {
    let topic = &publish.topic;
    let payload = publish.payload.to_vec();

    let Some(parsed) = topics::parse_topic(topic) else {
        return IncomingMessage::Unparseable {
            topic: topic.clone(),
            payload,
        };
    };

    match parsed.kind {
        TopicKind::Telemetry => IncomingMessage::Telemetry {
            tenant_id: parsed.tenant_id,
            device_id: parsed.device_id,
            payload,
        },
        TopicKind::Heartbeat => IncomingMessage::Heartbeat {
            tenant_id: parsed.tenant_id,
            device_id: parsed.device_id,
            payload,
        },
        TopicKind::Event => IncomingMessage::Event {
            tenant_id: parsed.tenant_id,
            device_id: parsed.device_id,
            payload,
        },
        TopicKind::ShadowReported => IncomingMessage::ShadowOrAck {
            tenant_id: parsed.tenant_id,
            device_id: parsed.device_id,
            topic_kind: "shadow_reported",
            payload,
        },
        TopicKind::ShadowDesired => IncomingMessage::ShadowOrAck {
            tenant_id: parsed.tenant_id,
            device_id: parsed.device_id,
            topic_kind: "shadow_desired",
            payload,
        },
        TopicKind::CommandAck => IncomingMessage::ShadowOrAck {
            tenant_id: parsed.tenant_id,
            device_id: parsed.device_id,
            topic_kind: "command_ack",
            payload,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::QoS;

    fn make_publish(topic: &str, payload: &[u8]) -> Publish {
        let mut publish = Publish::new(topic, QoS::AtLeastOnce, payload);
        publish.pkid = 1;
        publish
    }

    #[test]
    fn classify_telemetry() {
        let publish = make_publish("tenant/acme/device/dev-1/telemetry", b"{}");
        let msg = classify(&publish);
        assert!(matches!(
            msg,
            IncomingMessage::Telemetry { ref tenant_id, ref device_id, .. }
                if tenant_id == "acme" && device_id == "dev-1"
        ));
    }

    #[test]
    fn classify_heartbeat() {
        let publish = make_publish("tenant/acme/device/dev-1/heartbeat", b"{}");
        assert!(matches!(classify(&publish), IncomingMessage::Heartbeat { .. }));
    }

    #[test]
    fn classify_shadow_and_ack_as_shadow_or_ack() {
        let shadow = make_publish("tenant/acme/device/dev-1/shadow/reported", b"{}");
        assert!(matches!(
            classify(&shadow),
            IncomingMessage::ShadowOrAck { topic_kind: "shadow_reported", .. }
        ));

        let ack = make_publish("tenant/acme/device/dev-1/command/ack", b"{}");
        assert!(matches!(
            classify(&ack),
            IncomingMessage::ShadowOrAck { topic_kind: "command_ack", .. }
        ));
    }

    #[test]
    fn classify_unparseable_topic() {
        let publish = make_publish("garbage/topic", b"data");
        assert!(matches!(classify(&publish), IncomingMessage::Unparseable { .. }));
    }
}
