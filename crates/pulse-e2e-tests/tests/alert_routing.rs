//! Exercises the routing-rule matching that decides which channels an
//! alert transition fans out to, and the envelope that gets built for
//! delivery. This is the same `RoutingRule::matches` call
//! `pulse_notify::router::run_tenant` makes per (rule, alert) pair, here
//! driven directly against constructed rules instead of rows loaded
//! from Postgres.

use chrono::Utc;
use pulse_protocol::channel::{AlertPayload, RoutingRule};
use uuid::Uuid;

fn rule(severity_floor: u8, alert_types: &[&str], tags: &[&str]) -> RoutingRule {
    RoutingRule {
        id: Uuid::new_v4(),
        tenant_id: "acme".into(),
        channel_id: Uuid::new_v4(),
        severity_floor,
        alert_types: alert_types.iter().map(|s| s.to_string()).collect(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
        enabled: true,
    }
}

#[test]
fn a_rule_with_no_type_filter_matches_any_alert_type_at_or_above_its_floor() {
    let any_type = rule(4, &[], &[]);
    assert!(any_type.matches(4, "temp_high", &[]));
    assert!(any_type.matches(5, "disk_full", &[]));
    assert!(!any_type.matches(3, "temp_high", &[]), "below the severity floor never matches");
}

#[test]
fn a_rule_scoped_to_specific_alert_types_ignores_everything_else() {
    let scoped = rule(1, &["temp_high", "disk_full"], &[]);
    assert!(scoped.matches(1, "temp_high", &[]));
    assert!(!scoped.matches(1, "connectivity_lost", &[]));
}

#[test]
fn a_rule_requiring_tags_only_matches_when_every_tag_is_present() {
    let tagged = rule(1, &[], &["site:hq", "tier:critical"]);
    let both_tags = vec!["site:hq".to_string(), "tier:critical".to_string(), "extra".to_string()];
    let one_tag = vec!["site:hq".to_string()];

    assert!(tagged.matches(1, "anything", &both_tags));
    assert!(!tagged.matches(1, "anything", &one_tag), "a partial tag set must not match");
}

#[test]
fn a_disabled_rule_never_matches_regardless_of_severity() {
    let mut disabled = rule(1, &[], &[]);
    disabled.enabled = false;
    assert!(!disabled.matches(5, "anything", &[]));
}

#[test]
fn an_alert_transition_can_fan_out_to_multiple_matching_channels() {
    let pager = rule(4, &[], &[]);
    let slack = rule(1, &["temp_high"], &[]);
    let webhook = rule(1, &["disk_full"], &[]);
    let rules = [pager, slack, webhook];

    let matched: Vec<_> = rules.iter().filter(|r| r.matches(4, "temp_high", &[])).collect();
    assert_eq!(matched.len(), 2, "a critical temp_high alert should route to both pager and slack, not webhook");
}

#[test]
fn outbound_payload_carries_the_alert_identity_the_channel_sender_needs() {
    let alert_id = Uuid::new_v4();
    let payload = AlertPayload {
        alert_id,
        tenant_id: "acme".into(),
        device_id: "dev-1".into(),
        severity: 4,
        alert_type: "temp_high".into(),
        summary: "temperature above threshold".into(),
        details: serde_json::json!({"value": 48.1}),
        triggered_at: Utc::now(),
        site_id: None,
        _test: None,
    };

    let encoded = serde_json::to_value(&payload).expect("AlertPayload must serialize");
    assert_eq!(encoded["alert_id"], serde_json::json!(alert_id));
    assert!(encoded.get("_test").is_none(), "the _test marker is omitted entirely on real alerts, not sent as null");
}
