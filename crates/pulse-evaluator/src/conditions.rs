//! Per-kind rule condition evaluation against the latest (or trailing
//! window of) telemetry for a device.
//!
//! Every function returns `Ok(None)` when the metric has no data at all
//! for this device — callers treat that as "rule skipped, not an error"
//! (`spec.md` §4.3's tie-break). A mapping is applied transparently: if a
//! `MetricMapping` exists whose `normalized_metric` matches the name the
//! rule was written against, samples are read from the mapping's
//! `raw_metric` key and normalized before comparison.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use pulse_protocol::alert::{AggregateFn, ComparisonOp};
use pulse_protocol::mapping::MetricMapping;

use crate::error::EvalResult;

fn resolve_key<'a>(metric_name: &'a str, mappings: &'a [MetricMapping]) -> (&'a str, Option<&'a MetricMapping>) {
    match mappings.iter().find(|m| m.normalized_metric == metric_name) {
        Some(mapping) => (mapping.raw_metric.as_str(), Some(mapping)),
        None => (metric_name, None),
    }
}

fn apply_mapping(value: f64, mapping: Option<&MetricMapping>) -> f64 {
    match mapping {
        Some(mapping) => mapping.normalize(value),
        None => value,
    }
}

/// The device's latest value for `metric_name`, mapping-normalized.
/// `None` means the device has never reported this metric.
pub async fn latest_value(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric_name: &str,
    mappings: &[MetricMapping],
) -> EvalResult<Option<f64>> {
    let (raw_key, mapping) = resolve_key(metric_name, mappings);
    let raw = pulse_db::telemetry::latest_metric_value(conn, tenant_id, device_id, raw_key).await?;
    Ok(raw.map(|v| apply_mapping(v, mapping)))
}

async fn trailing_samples(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric_name: &str,
    since: DateTime<Utc>,
    mappings: &[MetricMapping],
) -> EvalResult<Vec<(DateTime<Utc>, f64)>> {
    let (raw_key, mapping) = resolve_key(metric_name, mappings);
    let samples = pulse_db::telemetry::recent_metric_samples(conn, tenant_id, device_id, raw_key, since).await?;
    Ok(samples.into_iter().map(|(t, v)| (t, apply_mapping(v, mapping))).collect())
}

/// Threshold rule's instantaneous comparison (duration-holding is layered
/// on top by the caller via `ConditionTracker`). Returns the normalized
/// value alongside the boolean so callers can build alert details.
pub async fn threshold_holds(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric: &str,
    op: ComparisonOp,
    threshold: f64,
    mappings: &[MetricMapping],
) -> EvalResult<Option<(bool, f64)>> {
    let Some(value) = latest_value(conn, tenant_id, device_id, metric, mappings).await? else {
        return Ok(None);
    };
    Ok(Some((op.evaluate(value, threshold), value)))
}

/// Anomaly rule: rolling mean/stddev over up to `window_minutes` of
/// history, firing when `|latest − mean| / stddev >= z_threshold`.
/// `stddev == 0` never fires (`spec.md` §8's boundary behaviour).
/// `None` when fewer than `min_samples` fall in the window.
pub async fn anomaly_holds(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric: &str,
    window_minutes: u32,
    min_samples: u32,
    z_threshold: f64,
    now: DateTime<Utc>,
    mappings: &[MetricMapping],
) -> EvalResult<Option<(bool, f64, f64, f64)>> {
    let since = now - chrono::Duration::minutes(i64::from(window_minutes));
    let samples = trailing_samples(conn, tenant_id, device_id, metric, since, mappings).await?;
    if samples.len() < min_samples as usize {
        return Ok(None);
    }

    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let stddev = variance.sqrt();

    // Samples are ordered most-recent-first (see `recent_metric_samples`).
    let latest = values[0];

    if stddev == 0.0 {
        return Ok(Some((false, latest, mean, stddev)));
    }

    let z = (latest - mean).abs() / stddev;
    Ok(Some((z >= z_threshold, latest, mean, stddev)))
}

/// Window-aggregation rule: aggregate `metric` over the trailing
/// `window_seconds`, compare the aggregate to `threshold`. `None` when
/// there are no samples in the window at all.
#[allow(clippy::too_many_arguments)]
pub async fn window_holds(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric: &str,
    window_seconds: u32,
    aggregate: AggregateFn,
    op: ComparisonOp,
    threshold: f64,
    now: DateTime<Utc>,
    mappings: &[MetricMapping],
) -> EvalResult<Option<(bool, f64)>> {
    let since = now - chrono::Duration::seconds(i64::from(window_seconds));
    let samples = trailing_samples(conn, tenant_id, device_id, metric, since, mappings).await?;
    if samples.is_empty() {
        return Ok(None);
    }

    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
    let aggregated = aggregate_values(aggregate, &values);
    Ok(Some((op.evaluate(aggregated, threshold), aggregated)))
}

fn aggregate_values(aggregate: AggregateFn, values: &[f64]) -> f64 {
    match aggregate {
        AggregateFn::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregateFn::Sum => values.iter().sum(),
        AggregateFn::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        AggregateFn::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        AggregateFn::Count => values.len() as f64,
    }
}

/// Telemetry-gap's instantaneous check: no data at all counts as a gap.
pub fn gap_holds(last_telemetry_at: Option<DateTime<Utc>>, now: DateTime<Utc>, gap_seconds: u32) -> bool {
    match last_telemetry_at {
        Some(last) => (now - last).num_seconds() > i64::from(gap_seconds),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_values_all_kinds() {
        let values = vec![10.0, 20.0, 30.0];
        assert_eq!(aggregate_values(AggregateFn::Avg, &values), 20.0);
        assert_eq!(aggregate_values(AggregateFn::Sum, &values), 60.0);
        assert_eq!(aggregate_values(AggregateFn::Min, &values), 10.0);
        assert_eq!(aggregate_values(AggregateFn::Max, &values), 30.0);
        assert_eq!(aggregate_values(AggregateFn::Count, &values), 3.0);
    }

    #[test]
    fn gap_holds_fires_past_threshold() {
        let now = Utc::now();
        let last = now - chrono::Duration::seconds(90);
        assert!(gap_holds(Some(last), now, 60));
        assert!(!gap_holds(Some(last), now, 120));
    }

    #[test]
    fn gap_holds_with_no_telemetry_ever() {
        let now = Utc::now();
        assert!(gap_holds(None, now, 60));
    }

    #[test]
    fn resolve_key_prefers_mapping_raw_metric() {
        let mappings = vec![MetricMapping {
            tenant_id: "acme".into(),
            raw_metric: "temp_raw".into(),
            normalized_metric: "temp_c".into(),
            multiplier: 0.1,
            offset: -40.0,
            display_unit: Some("C".into()),
        }];
        let (key, mapping) = resolve_key("temp_c", &mappings);
        assert_eq!(key, "temp_raw");
        assert!(mapping.is_some());

        let (key, mapping) = resolve_key("humidity", &mappings);
        assert_eq!(key, "humidity");
        assert!(mapping.is_none());
    }
}
