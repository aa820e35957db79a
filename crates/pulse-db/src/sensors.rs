//! Sensor auto-discovery queries.

use sqlx::PgConnection;

use crate::error::GatewayResult;

/// Count of sensors currently registered for a device.
pub async fn count_for_device(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
) -> GatewayResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM sensor WHERE tenant_id = $1 AND device_id = $2",
    )
    .bind(tenant_id)
    .bind(device_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// Whether a metric key already has a sensor row.
pub async fn exists(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric_key: &str,
) -> GatewayResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM sensor WHERE tenant_id = $1 AND device_id = $2 AND metric_key = $3)",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(metric_key)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

/// Insert a new sensor row for a just-discovered metric key. Callers must
/// check the effective sensor limit first — this function does not enforce
/// it, matching the ingest-side "log and skip" policy on overflow.
pub async fn insert_discovered(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric_key: &str,
) -> GatewayResult<()> {
    sqlx::query(
        "INSERT INTO sensor (tenant_id, device_id, metric_key) \
         VALUES ($1, $2, $3) ON CONFLICT (tenant_id, device_id, metric_key) DO NOTHING",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(metric_key)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Update the cached `(last_value, last_seen_at)` for a sensor, following
/// the latest telemetry observation.
pub async fn touch(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric_key: &str,
    value: &serde_json::Value,
    seen_at: chrono::DateTime<chrono::Utc>,
) -> GatewayResult<()> {
    sqlx::query(
        "UPDATE sensor SET last_value = $4, last_seen_at = $5 \
         WHERE tenant_id = $1 AND device_id = $2 AND metric_key = $3",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(metric_key)
    .bind(value)
    .bind(seen_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
