//! Alert open/close wrappers: fingerprint selection and `details` payload
//! construction on top of `pulse_db::alerts`'s idempotent upsert.

use serde_json::json;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use pulse_protocol::alert::{gap_fingerprint, rule_fingerprint};

use crate::error::EvalResult;

/// Condition-kind tag used as `alert_type` for rule-sourced alerts, and as
/// part of the `details` payload handed to the notification router.
pub enum Evaluation {
    Threshold { value: f64 },
    MultiCondition { matched: Vec<String> },
    Anomaly { value: f64, mean: f64, stddev: f64 },
    Window { aggregated: f64 },
}

impl Evaluation {
    fn alert_type(&self) -> &'static str {
        match self {
            Evaluation::Threshold { .. } => "threshold",
            Evaluation::MultiCondition { .. } => "multi_condition",
            Evaluation::Anomaly { .. } => "anomaly",
            Evaluation::Window { .. } => "window",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            Evaluation::Threshold { value } => json!({ "value": value }),
            Evaluation::MultiCondition { matched } => json!({ "matched_conditions": matched }),
            Evaluation::Anomaly { value, mean, stddev } => {
                json!({ "value": value, "mean": mean, "stddev": stddev })
            }
            Evaluation::Window { aggregated } => json!({ "aggregated_value": aggregated }),
        }
    }
}

/// Open (or no-op onto an already-open) alert for a rule match.
#[allow(clippy::too_many_arguments)]
pub async fn open_for_rule(
    conn: &mut PgConnection,
    tenant_id: &str,
    rule_id: Uuid,
    rule_name: &str,
    device_id: &str,
    severity: u8,
    evaluation: Evaluation,
) -> EvalResult<Uuid> {
    let fingerprint = rule_fingerprint(rule_id, device_id);
    let summary = format!("{rule_name} on {device_id}");
    let outcome = pulse_db::alerts::open(
        conn,
        tenant_id,
        &fingerprint,
        Some(rule_id),
        device_id,
        evaluation.alert_type(),
        severity,
        &summary,
        &evaluation.details(),
    )
    .await?;

    if outcome.inserted {
        info!(tenant_id, %rule_id, device_id, alert_id = %outcome.alert_id, "alert opened");
    }
    Ok(outcome.alert_id)
}

/// Close the alert matching a rule's fingerprint, if open.
pub async fn close_for_rule(
    conn: &mut PgConnection,
    tenant_id: &str,
    rule_id: Uuid,
    device_id: &str,
) -> EvalResult<bool> {
    let fingerprint = rule_fingerprint(rule_id, device_id);
    let closed = pulse_db::alerts::close(conn, tenant_id, &fingerprint).await?;
    if let Some(alert) = &closed {
        info!(tenant_id, %rule_id, device_id, alert_id = %alert.id, "alert closed");
    }
    Ok(closed.is_some())
}

/// Severity assigned to telemetry-gap alerts (`spec.md` §8 scenario 2).
const GAP_ALERT_SEVERITY: u8 = 4;

/// Open (or no-op onto an already-open) telemetry-gap alert for a device.
pub async fn open_gap(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    gap_seconds: u32,
) -> EvalResult<Uuid> {
    let fingerprint = gap_fingerprint(device_id);
    let summary = format!("no telemetry from {device_id} for over {gap_seconds}s");
    let outcome = pulse_db::alerts::open(
        conn,
        tenant_id,
        &fingerprint,
        None,
        device_id,
        "NO_TELEMETRY",
        GAP_ALERT_SEVERITY,
        &summary,
        &json!({ "gap_seconds": gap_seconds }),
    )
    .await?;

    if outcome.inserted {
        info!(tenant_id, device_id, alert_id = %outcome.alert_id, "gap alert opened");
    }
    Ok(outcome.alert_id)
}

/// Close a device's open telemetry-gap alert, if any.
pub async fn close_gap(conn: &mut PgConnection, tenant_id: &str, device_id: &str) -> EvalResult<bool> {
    let fingerprint = gap_fingerprint(device_id);
    let closed = pulse_db::alerts::close(conn, tenant_id, &fingerprint).await?;
    if let Some(alert) = &closed {
        info!(tenant_id, device_id, alert_id = %alert.id, "gap alert closed");
    }
    Ok(closed.is_some())
}
