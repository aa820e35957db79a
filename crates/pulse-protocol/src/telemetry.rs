//! Telemetry envelope and platform-health domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys reserved by the envelope itself; anything else in the inbound
/// payload is folded into `metrics`.
pub const RESERVED_KEYS: &[&str] = &["time", "seq", "site_id", "msg_type", "tenant_id", "device_id"];

/// A single metric value. Duck-typed payloads coming off the wire only
/// ever carry numbers, strings, booleans, or null — this tags that
/// closed set explicitly instead of keeping raw `serde_json::Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Discriminates the three inbound message kinds carried on the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
    Telemetry,
    Heartbeat,
    Event,
}

/// A validated telemetry row, ready for the hypertable batch writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRow {
    pub time: DateTime<Utc>,
    pub tenant_id: String,
    pub device_id: String,
    pub site_id: Option<String>,
    pub msg_type: MsgType,
    pub seq: Option<u64>,
    pub metrics: BTreeMap<String, MetricValue>,
}

/// Raw inbound payload before the envelope fields are split out of
/// `metrics`. Deserialized straight from the MQTT message body.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTelemetryPayload {
    pub time: Option<String>,
    pub seq: Option<u64>,
    pub site_id: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl RawTelemetryPayload {
    /// Split the envelope fields (already captured above) away from the
    /// remaining free-form metric keys, converting each to a `MetricValue`.
    /// Reserved keys that leak into `fields` via flatten are dropped.
    pub fn into_metrics(self) -> BTreeMap<String, MetricValue> {
        self.fields
            .into_iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k, to_metric_value(v)))
            .collect()
    }
}

fn to_metric_value(value: serde_json::Value) -> MetricValue {
    match value {
        serde_json::Value::Number(n) => MetricValue::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => MetricValue::String(s),
        serde_json::Value::Bool(b) => MetricValue::Bool(b),
        _ => MetricValue::Null,
    }
}

/// Radio/power/internals fields for the platform-health hypertable.
/// Never mixed with customer telemetry rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformHealthRow {
    pub time: DateTime<Utc>,
    pub tenant_id: String,
    pub device_id: String,
    pub rssi: Option<f64>,
    pub rsrp: Option<f64>,
    pub rsrq: Option<f64>,
    pub sinr: Option<f64>,
    pub network_type: Option<String>,
    pub battery_pct: Option<f64>,
    pub voltage: Option<f64>,
    pub power_source: Option<String>,
    pub cpu_temp_c: Option<f64>,
    pub memory_used_pct: Option<f64>,
    pub uptime_secs: Option<u64>,
    pub reboot_count: Option<u32>,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_payload_splits_reserved_from_metrics() {
        let raw: RawTelemetryPayload = serde_json::from_str(
            r#"{"time":"2026-01-01T00:00:00Z","seq":3,"site_id":"site-a","temp_c":45.1,"label":"ok"}"#,
        )
        .unwrap();
        assert_eq!(raw.seq, Some(3));
        assert_eq!(raw.site_id.as_deref(), Some("site-a"));

        let metrics = raw.into_metrics();
        assert_eq!(metrics.get("temp_c"), Some(&MetricValue::Number(45.1)));
        assert_eq!(
            metrics.get("label"),
            Some(&MetricValue::String("ok".into()))
        );
        assert!(!metrics.contains_key("time"));
        assert!(!metrics.contains_key("seq"));
    }

    #[test]
    fn metric_value_as_f64() {
        assert_eq!(MetricValue::Number(1.5).as_f64(), Some(1.5));
        assert_eq!(MetricValue::String("x".into()).as_f64(), None);
    }
}
