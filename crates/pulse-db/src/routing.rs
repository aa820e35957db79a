//! Routing rule queries.

use pulse_protocol::channel::RoutingRule;
use sqlx::PgConnection;
use sqlx::Row;

use crate::error::GatewayResult;

/// Active routing rules for a tenant, the routing engine's per-pass input.
pub async fn active_for_tenant(
    conn: &mut PgConnection,
    tenant_id: &str,
) -> GatewayResult<Vec<RoutingRule>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, channel_id, severity_floor, alert_types, tags, enabled \
         FROM routing_rule WHERE tenant_id = $1 AND enabled",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RoutingRule {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            channel_id: row.get("channel_id"),
            severity_floor: row.get::<i16, _>("severity_floor") as u8,
            alert_types: row.get("alert_types"),
            tags: row.get("tags"),
            enabled: row.get("enabled"),
        })
        .collect())
}
