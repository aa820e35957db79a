//! MQTT topic builders and parser for the tenant/device topic grammar.
//!
//! Topic structure:
//! ```text
//! tenant/{tenant_id}/device/{device_id}/telemetry
//! tenant/{tenant_id}/device/{device_id}/heartbeat
//! tenant/{tenant_id}/device/{device_id}/event
//! tenant/{tenant_id}/device/{device_id}/shadow/{reported|desired}
//! tenant/{tenant_id}/device/{device_id}/command/ack
//! ```

const PREFIX: &str = "tenant";
const SEGMENT: &str = "device";

/// Inbound message kind, discriminated by the topic's trailing segment(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Telemetry,
    Heartbeat,
    Event,
    ShadowReported,
    ShadowDesired,
    CommandAck,
}

/// Parsed components of an inbound device topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub tenant_id: String,
    pub device_id: String,
    pub kind: TopicKind,
}

/// Build the telemetry publish topic for a device.
pub fn telemetry(tenant_id: &str, device_id: &str) -> String {
    format!("{PREFIX}/{tenant_id}/{SEGMENT}/{device_id}/telemetry")
}

/// Build the heartbeat publish topic for a device.
pub fn heartbeat(tenant_id: &str, device_id: &str) -> String {
    format!("{PREFIX}/{tenant_id}/{SEGMENT}/{device_id}/heartbeat")
}

/// Build the event publish topic for a device.
pub fn event(tenant_id: &str, device_id: &str) -> String {
    format!("{PREFIX}/{tenant_id}/{SEGMENT}/{device_id}/event")
}

/// Build the shadow-reported publish topic for a device.
pub fn shadow_reported(tenant_id: &str, device_id: &str) -> String {
    format!("{PREFIX}/{tenant_id}/{SEGMENT}/{device_id}/shadow/reported")
}

/// Build the shadow-desired publish topic for a device.
pub fn shadow_desired(tenant_id: &str, device_id: &str) -> String {
    format!("{PREFIX}/{tenant_id}/{SEGMENT}/{device_id}/shadow/desired")
}

/// Build the command-ack publish topic for a device.
pub fn command_ack(tenant_id: &str, device_id: &str) -> String {
    format!("{PREFIX}/{tenant_id}/{SEGMENT}/{device_id}/command/ack")
}

/// Subscription filters the ingest service registers at startup.
pub fn subscription_filters() -> [&'static str; 5] {
    [
        "tenant/+/device/+/telemetry",
        "tenant/+/device/+/heartbeat",
        "tenant/+/device/+/event",
        "tenant/+/device/+/shadow/reported",
        "tenant/+/device/+/command/ack",
    ]
}

/// Parse an inbound topic into its tenant/device/kind components.
///
/// Returns `None` for anything that doesn't match the grammar — callers
/// treat an unparseable topic the same as a validation failure.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.first() != Some(&PREFIX) || parts.get(2) != Some(&SEGMENT) {
        return None;
    }

    let tenant_id = (*parts.get(1)?).to_string();
    let device_id = (*parts.get(3)?).to_string();

    let kind = match parts.get(4).copied() {
        Some("telemetry") if parts.len() == 5 => TopicKind::Telemetry,
        Some("heartbeat") if parts.len() == 5 => TopicKind::Heartbeat,
        Some("event") if parts.len() == 5 => TopicKind::Event,
        Some("shadow") => match parts.get(5).copied() {
            Some("reported") if parts.len() == 6 => TopicKind::ShadowReported,
            Some("desired") if parts.len() == 6 => TopicKind::ShadowDesired,
            _ => return None,
        },
        Some("command") => match parts.get(5).copied() {
            Some("ack") if parts.len() == 6 => TopicKind::CommandAck,
            _ => return None,
        },
        _ => return None,
    };

    Some(ParsedTopic {
        tenant_id,
        device_id,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_topic_format() {
        assert_eq!(
            telemetry("acme", "dev-1"),
            "tenant/acme/device/dev-1/telemetry"
        );
    }

    #[test]
    fn parse_telemetry_topic() {
        let parsed = parse_topic("tenant/acme/device/dev-1/telemetry").unwrap();
        assert_eq!(parsed.tenant_id, "acme");
        assert_eq!(parsed.device_id, "dev-1");
        assert_eq!(parsed.kind, TopicKind::Telemetry);
    }

    #[test]
    fn parse_heartbeat_topic() {
        let parsed = parse_topic("tenant/acme/device/dev-1/heartbeat").unwrap();
        assert_eq!(parsed.kind, TopicKind::Heartbeat);
    }

    #[test]
    fn parse_shadow_topics() {
        let reported = parse_topic("tenant/acme/device/dev-1/shadow/reported").unwrap();
        assert_eq!(reported.kind, TopicKind::ShadowReported);

        let desired = parse_topic("tenant/acme/device/dev-1/shadow/desired").unwrap();
        assert_eq!(desired.kind, TopicKind::ShadowDesired);
    }

    #[test]
    fn parse_command_ack_topic() {
        let parsed = parse_topic("tenant/acme/device/dev-1/command/ack").unwrap();
        assert_eq!(parsed.kind, TopicKind::CommandAck);
    }

    #[test]
    fn rejects_malformed_topics() {
        assert!(parse_topic("tenant/acme/dev-1/telemetry").is_none());
        assert!(parse_topic("tenant/acme/device/dev-1/shadow/unknown").is_none());
        assert!(parse_topic("tenant/acme/device/dev-1/command/request").is_none());
        assert!(parse_topic("").is_none());
        assert!(parse_topic("fleet/acme/device/dev-1/telemetry").is_none());
    }

    #[test]
    fn subscription_filters_match_spec() {
        let filters = subscription_filters();
        assert!(filters.contains(&"tenant/+/device/+/telemetry"));
        assert!(filters.contains(&"tenant/+/device/+/command/ack"));
        assert_eq!(filters.len(), 5);
    }
}
