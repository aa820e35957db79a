//! Alert rule queries.

use pulse_protocol::alert::{AlertRule, RuleCondition};
use sqlx::PgConnection;
use sqlx::Row;

use crate::error::GatewayResult;

/// All enabled rules across every tenant (or a shard), the evaluator's
/// cache-refill query. Requires an operator-scoped connection.
pub async fn load_enabled(conn: &mut PgConnection) -> GatewayResult<Vec<AlertRule>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, name, severity, site_ids, group_ids, device_group_id, \
         metric_name, sensor_id, sensor_type, condition \
         FROM alert_rule WHERE enabled",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().filter_map(row_to_rule).collect())
}

/// Enabled rules for a single tenant, used by the per-tenant evaluation
/// pass when the rule cache is cold or invalidated.
pub async fn load_enabled_for_tenant(conn: &mut PgConnection, tenant_id: &str) -> GatewayResult<Vec<AlertRule>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, name, severity, site_ids, group_ids, device_group_id, \
         metric_name, sensor_id, sensor_type, condition \
         FROM alert_rule WHERE enabled AND tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().filter_map(row_to_rule).collect())
}

/// Decode one rule row, skipping it (rather than coercing to some default
/// condition) when `condition` is malformed or an unknown kind — a rule
/// this process can't understand must never silently become a firing
/// gap rule.
fn row_to_rule(row: sqlx::postgres::PgRow) -> Option<AlertRule> {
    let id: uuid::Uuid = row.get("id");
    let condition: serde_json::Value = row.get("condition");
    let condition: RuleCondition = match serde_json::from_value(condition) {
        Ok(condition) => condition,
        Err(err) => {
            tracing::warn!(rule_id = %id, error = %err, "skipping rule with unparseable condition");
            return None;
        }
    };

    Some(AlertRule {
        id,
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        severity: row.get::<i16, _>("severity") as u8,
        enabled: true,
        site_ids: row.get("site_ids"),
        group_ids: row.get("group_ids"),
        device_group_id: row.get("device_group_id"),
        metric_name: row.get("metric_name"),
        sensor_id: row.get("sensor_id"),
        sensor_type: row.get("sensor_type"),
        condition,
    })
}
