//! Exercises the per-message decision logic the ingest subscriber runs
//! before a telemetry row ever reaches the batch writer: rate limiting,
//! payload validation, and health-field splitting. These are the same
//! pure/synchronous pieces `pulse_ingest::pipeline::process` calls in
//! sequence against a live broker; wiring a broker isn't needed to
//! prove the decisions themselves are correct.

use pulse_ingest::config::IngestConfig;
use pulse_ingest::rate_limit::RateLimiter;
use pulse_ingest::validate::{validate, SeqTracker};
use pulse_protocol::telemetry::MsgType;
use pulse_protocol::topics::{self, TopicKind};

fn config() -> IngestConfig {
    IngestConfig {
        batch_interval_ms: 500,
        batch_size: 500,
        rate_limit_capacity: 2,
        rate_limit_refill_per_sec: 0.0,
        rate_limit_idle_ttl_secs: 60,
        auth_cache_positive_ttl_secs: 300,
        auth_cache_negative_ttl_secs: 30,
        max_payload_bytes: 65_536,
        overflow_dir: "/tmp".into(),
        health_port: 8080,
    }
}

#[test]
fn device_topic_round_trips_through_parser() {
    let topic = topics::telemetry("acme", "dev-1");
    let parsed = topics::parse_topic(&topic).expect("telemetry topic should parse");
    assert_eq!(parsed.tenant_id, "acme");
    assert_eq!(parsed.device_id, "dev-1");
    assert_eq!(parsed.kind, TopicKind::Telemetry);
}

#[test]
fn a_bursting_device_is_rate_limited_before_validation_runs() {
    let limiter = RateLimiter::new(&config());

    assert!(limiter.try_consume("acme", "dev-1"));
    assert!(limiter.try_consume("acme", "dev-1"));
    assert!(!limiter.try_consume("acme", "dev-1"), "third message within the same window should be dropped");

    // A different device on the same tenant has its own bucket and is
    // unaffected by dev-1's burst.
    assert!(limiter.try_consume("acme", "dev-2"));
}

#[test]
fn admitted_telemetry_splits_into_metrics_and_platform_health_rows() {
    let tracker = SeqTracker::new();
    let payload = br#"{"seq":1,"temp_c":41.2,"rssi":-78,"battery_pct":62.0}"#;

    let (row, health) = validate("acme", "dev-1", MsgType::Telemetry, payload, config().max_payload_bytes, None, &tracker)
        .expect("well formed payload should validate");

    assert!(row.metrics.contains_key("temp_c"));
    assert!(!row.metrics.contains_key("rssi"), "platform-health fields never land in the generic metrics map");

    let health = health.expect("rssi/battery_pct fields should produce a platform-health row");
    assert_eq!(health.rssi, Some(-78.0));
    assert_eq!(health.battery_pct, Some(62.0));
}

#[test]
fn oversized_payload_is_rejected_before_rate_limiter_state_is_touched() {
    let tracker = SeqTracker::new();
    let oversized = vec![b'x'; config().max_payload_bytes + 1];
    let payload = format!(r#"{{"pad":"{}"}}"#, String::from_utf8_lossy(&oversized));

    let result = validate("acme", "dev-1", MsgType::Telemetry, payload.as_bytes(), config().max_payload_bytes, None, &tracker);
    assert!(result.is_err(), "a payload over the size cap must be rejected, not silently truncated");
}
