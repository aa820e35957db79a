//! Metric normalization mapping queries.

use pulse_protocol::mapping::MetricMapping;
use sqlx::PgConnection;
use sqlx::Row;

use crate::error::GatewayResult;

/// All mappings for a tenant, the evaluator's per-tenant mapping-cache
/// refill query (`spec.md` §4.3 step 2).
pub async fn load_for_tenant(conn: &mut PgConnection, tenant_id: &str) -> GatewayResult<Vec<MetricMapping>> {
    let rows = sqlx::query(
        "SELECT tenant_id, raw_metric, normalized_metric, multiplier, offset_value, display_unit \
         FROM metric_mapping WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| MetricMapping {
            tenant_id: row.get("tenant_id"),
            raw_metric: row.get("raw_metric"),
            normalized_metric: row.get("normalized_metric"),
            multiplier: row.get("multiplier"),
            offset: row.get("offset_value"),
            display_unit: row.get("display_unit"),
        })
        .collect())
}
