//! Telemetry payload validation: size cap, schema-tolerant JSON parsing,
//! `time`/`seq` normalization.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use pulse_protocol::telemetry::{MsgType, PlatformHealthRow, RawTelemetryPayload, TelemetryRow};

use crate::error::{IngestError, IngestResult};

/// Field names recognized as platform-health telemetry rather than
/// customer metrics. A heartbeat or telemetry payload carrying any of
/// these produces a `PlatformHealthRow` alongside the generic
/// `TelemetryRow` — the two hypertables are never mixed (`spec.md` §4.1).
const HEALTH_FIELDS: &[&str] = &[
    "rssi",
    "rsrp",
    "rsrq",
    "sinr",
    "network_type",
    "battery_pct",
    "voltage",
    "power_source",
    "cpu_temp_c",
    "memory_used_pct",
    "uptime_secs",
    "reboot_count",
    "gps_lat",
    "gps_lon",
];

/// Tracks the last `seq` observed per device so out-of-order arrivals can
/// be logged. `seq` monotonicity is consulted, not enforced (`spec.md`
/// §4.2: "a drop is allowed but not mandatory") — ingest never rejects a
/// message for going backwards.
pub struct SeqTracker {
    last_seen: Mutex<HashMap<(String, String), u64>>,
}

impl SeqTracker {
    pub fn new() -> Self {
        Self {
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `seq` for `(tenant_id, device_id)`, returning `true` if it's
    /// monotonic non-decreasing relative to the last value seen.
    fn observe(&self, tenant_id: &str, device_id: &str, seq: u64) -> bool {
        let mut last_seen = self.last_seen.lock().unwrap();
        let key = (tenant_id.to_string(), device_id.to_string());
        let monotonic = match last_seen.get(&key) {
            Some(&prev) => seq >= prev,
            None => true,
        };
        last_seen.insert(key, seq);
        monotonic
    }
}

impl Default for SeqTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a raw MQTT payload and produce a `TelemetryRow` ready for the
/// batch writer. Rejections are `IngestError::Validation`, which the
/// caller turns into a quarantine event.
pub fn validate(
    tenant_id: &str,
    device_id: &str,
    msg_type: MsgType,
    payload: &[u8],
    max_payload_bytes: usize,
    site_id_override: Option<String>,
    seq_tracker: &SeqTracker,
) -> IngestResult<(TelemetryRow, Option<PlatformHealthRow>)> {
    if payload.len() > max_payload_bytes {
        return Err(IngestError::Validation(format!(
            "payload {} bytes exceeds cap of {max_payload_bytes}",
            payload.len()
        )));
    }

    let raw: RawTelemetryPayload = serde_json::from_slice(payload)
        .map_err(|e| IngestError::Validation(format!("invalid json: {e}")))?;

    let time = match &raw.time {
        Some(raw_time) => DateTime::parse_from_rfc3339(raw_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| IngestError::Validation(format!("invalid time '{raw_time}': {e}")))?,
        None => Utc::now(),
    };

    if let Some(seq) = raw.seq {
        if !seq_tracker.observe(tenant_id, device_id, seq) {
            tracing::debug!(tenant_id, device_id, seq, "out-of-order seq observed");
        }
    }

    let seq = raw.seq;
    let site_id = raw.site_id.clone().or(site_id_override);
    let health = extract_health(tenant_id, device_id, time, msg_type, &raw.fields);
    let metrics = raw.into_metrics();

    let row = TelemetryRow {
        time,
        tenant_id: tenant_id.to_string(),
        device_id: device_id.to_string(),
        site_id,
        msg_type,
        seq,
        metrics,
    };

    Ok((row, health))
}

fn extract_health(
    tenant_id: &str,
    device_id: &str,
    time: DateTime<Utc>,
    msg_type: MsgType,
    fields: &std::collections::BTreeMap<String, serde_json::Value>,
) -> Option<PlatformHealthRow> {
    if !HEALTH_FIELDS.iter().any(|key| fields.contains_key(*key)) {
        return None;
    }

    let f64_field = |key: &str| fields.get(key).and_then(|v| v.as_f64());
    let str_field = |key: &str| fields.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let u64_field = |key: &str| fields.get(key).and_then(|v| v.as_u64());

    // `extra` absorbs forward-compatible health keys, but only on a
    // `heartbeat` message: that topic carries nothing but platform health,
    // so any non-reserved key left over is a future health field, not a
    // customer metric. A `telemetry`/`event` message mixing known health
    // fields with customer metrics still gets its fixed health columns
    // populated, but its unrecognized keys go to `metrics`, not `extra`
    // (`spec.md` §3: the health hypertable is "never mixed with customer
    // telemetry").
    let mut extra = serde_json::Map::new();
    if msg_type == MsgType::Heartbeat {
        for (key, value) in fields {
            if !HEALTH_FIELDS.contains(&key.as_str()) {
                extra.insert(key.clone(), value.clone());
            }
        }
    }

    Some(PlatformHealthRow {
        time,
        tenant_id: tenant_id.to_string(),
        device_id: device_id.to_string(),
        rssi: f64_field("rssi"),
        rsrp: f64_field("rsrp"),
        rsrq: f64_field("rsrq"),
        sinr: f64_field("sinr"),
        network_type: str_field("network_type"),
        battery_pct: f64_field("battery_pct"),
        voltage: f64_field("voltage"),
        power_source: str_field("power_source"),
        cpu_temp_c: f64_field("cpu_temp_c"),
        memory_used_pct: f64_field("memory_used_pct"),
        uptime_secs: u64_field("uptime_secs"),
        reboot_count: u64_field("reboot_count").map(|v| v as u32),
        gps_lat: f64_field("gps_lat"),
        gps_lon: f64_field("gps_lon"),
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: usize = 64 * 1024;

    #[test]
    fn rejects_payload_over_cap() {
        let oversized = vec![b'a'; CAP + 1];
        let payload = format!(r#"{{"pad":"{}"}}"#, String::from_utf8_lossy(&oversized));
        let tracker = SeqTracker::new();
        let result = validate("acme", "dev-1", MsgType::Telemetry, payload.as_bytes(), CAP, None, &tracker);
        assert!(matches!(result, Err(IngestError::Validation(_))));
    }

    #[test]
    fn accepts_payload_at_exactly_cap() {
        let body = br#"{"temp_c":21.5}"#;
        let tracker = SeqTracker::new();
        let result = validate("acme", "dev-1", MsgType::Telemetry, body, body.len(), None, &tracker);
        assert!(result.is_ok());
    }

    #[test]
    fn missing_time_falls_back_to_wall_clock() {
        let tracker = SeqTracker::new();
        let (row, _) = validate("acme", "dev-1", MsgType::Telemetry, br#"{"temp_c":1.0}"#, CAP, None, &tracker).unwrap();
        assert!(Utc::now().signed_duration_since(row.time).num_seconds() < 5);
    }

    #[test]
    fn rejects_malformed_time() {
        let tracker = SeqTracker::new();
        let result = validate(
            "acme",
            "dev-1",
            MsgType::Telemetry,
            br#"{"time":"not-a-date"}"#,
            CAP,
            None,
            &tracker,
        );
        assert!(matches!(result, Err(IngestError::Validation(_))));
    }

    #[test]
    fn seq_out_of_order_is_logged_not_rejected() {
        let tracker = SeqTracker::new();
        validate("acme", "dev-1", MsgType::Telemetry, br#"{"seq":5}"#, CAP, None, &tracker).unwrap();
        let result = validate("acme", "dev-1", MsgType::Telemetry, br#"{"seq":2}"#, CAP, None, &tracker);
        assert!(result.is_ok());
    }

    #[test]
    fn telemetry_customer_metrics_do_not_leak_into_health_extra() {
        let tracker = SeqTracker::new();
        let (_, health) = validate(
            "acme",
            "dev-1",
            MsgType::Telemetry,
            br#"{"rssi":-60,"temp_c":45.1,"door_open":true}"#,
            CAP,
            None,
            &tracker,
        )
        .unwrap();
        let health = health.expect("rssi should still produce a health row");
        assert_eq!(health.rssi, Some(-60.0));
        assert!(health.extra.is_empty());
    }

    #[test]
    fn heartbeat_unknown_fields_flow_into_health_extra() {
        let tracker = SeqTracker::new();
        let (_, health) = validate(
            "acme",
            "dev-1",
            MsgType::Heartbeat,
            br#"{"rssi":-60,"signal_bars":3}"#,
            CAP,
            None,
            &tracker,
        )
        .unwrap();
        let health = health.expect("rssi should produce a health row");
        assert_eq!(health.extra.get("signal_bars").and_then(|v| v.as_i64()), Some(3));
    }

    #[test]
    fn reserved_keys_excluded_from_metrics() {
        let tracker = SeqTracker::new();
        let row = validate(
            "acme",
            "dev-1",
            MsgType::Telemetry,
            br#"{"seq":1,"site_id":"site-a","temp_c":45.1}"#,
            CAP,
            None,
            &tracker,
        )
        .unwrap();
        assert_eq!(row.site_id.as_deref(), Some("site-a"));
        assert!(row.metrics.contains_key("temp_c"));
        assert!(!row.metrics.contains_key("seq"));
    }
}
