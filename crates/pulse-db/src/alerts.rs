//! Alert lifecycle queries — open/close via the fingerprint-keyed upsert.

use pulse_protocol::alert::{Alert, AlertStatus};
use sqlx::PgConnection;
use sqlx::Row;
use uuid::Uuid;

use crate::error::GatewayResult;

/// Outcome of an open attempt: whether this call actually inserted the row
/// or found it already open (idempotency per `spec.md` §8's "Idempotent
/// open" law).
pub struct OpenOutcome {
    pub alert_id: Uuid,
    pub inserted: bool,
}

/// Upsert keyed on `(tenant_id, fingerprint)`: insert if none exists,
/// otherwise a concurrent opener just observes "already open". Invokes the
/// `open_alert` stored procedure, which also emits `alerts_changed`.
#[allow(clippy::too_many_arguments)]
pub async fn open(
    conn: &mut PgConnection,
    tenant_id: &str,
    fingerprint: &str,
    rule_id: Option<Uuid>,
    device_id: &str,
    alert_type: &str,
    severity: u8,
    summary: &str,
    details: &serde_json::Value,
) -> GatewayResult<OpenOutcome> {
    let row = sqlx::query(
        "SELECT alert_id, inserted FROM open_alert($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(tenant_id)
    .bind(fingerprint)
    .bind(rule_id)
    .bind(device_id)
    .bind(alert_type)
    .bind(severity as i16)
    .bind(summary)
    .bind(details)
    .fetch_one(&mut *conn)
    .await?;

    Ok(OpenOutcome {
        alert_id: row.get("alert_id"),
        inserted: row.get("inserted"),
    })
}

/// Close the open alert matching a fingerprint, if any. Invokes the
/// `close_alert` stored procedure, which also emits `alerts_changed`.
pub async fn close(
    conn: &mut PgConnection,
    tenant_id: &str,
    fingerprint: &str,
) -> GatewayResult<Option<Alert>> {
    let row = sqlx::query(
        "SELECT id, tenant_id, fingerprint, rule_id, device_id, alert_type, severity, \
         status, opened_at, closed_at, summary, details \
         FROM close_alert($1, $2)",
    )
    .bind(tenant_id)
    .bind(fingerprint)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(row_to_alert))
}

/// All open alerts for a tenant, used by the routing engine's safety sweep.
pub async fn open_alerts_for_tenant(
    conn: &mut PgConnection,
    tenant_id: &str,
) -> GatewayResult<Vec<Alert>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, fingerprint, rule_id, device_id, alert_type, severity, \
         status, opened_at, closed_at, summary, details \
         FROM fleet_alert WHERE tenant_id = $1 AND status = 'OPEN'",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(row_to_alert).collect())
}

/// Alerts that opened or closed since `since`, the routing engine's
/// per-pass input for both the reactive wake-up and the safety sweep.
pub async fn recently_transitioned(
    conn: &mut PgConnection,
    tenant_id: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> GatewayResult<Vec<Alert>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, fingerprint, rule_id, device_id, alert_type, severity, \
         status, opened_at, closed_at, summary, details \
         FROM fleet_alert \
         WHERE tenant_id = $1 AND (opened_at >= $2 OR closed_at >= $2)",
    )
    .bind(tenant_id)
    .bind(since)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(row_to_alert).collect())
}

fn row_to_alert(row: sqlx::postgres::PgRow) -> Alert {
    Alert {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        fingerprint: row.get("fingerprint"),
        rule_id: row.get("rule_id"),
        device_id: row.get("device_id"),
        alert_type: row.get("alert_type"),
        severity: row.get::<i16, _>("severity") as u8,
        status: match row.get::<String, _>("status").as_str() {
            "ACKNOWLEDGED" => AlertStatus::Acknowledged,
            "CLOSED" => AlertStatus::Closed,
            _ => AlertStatus::Open,
        },
        opened_at: row.get("opened_at"),
        closed_at: row.get("closed_at"),
        summary: row.get("summary"),
        details: row.get("details"),
    }
}
