//! Telemetry batch-write queries.

use pulse_protocol::telemetry::TelemetryRow;
use sqlx::PgConnection;

use crate::error::GatewayResult;

/// Invoke `insert_telemetry_batch(rows jsonb_array)`, returning the
/// inserted row count. Retried whole by the caller on transient failure.
pub async fn insert_batch(conn: &mut PgConnection, rows: &[TelemetryRow]) -> GatewayResult<i32> {
    let payload = serde_json::to_value(rows).unwrap_or(serde_json::Value::Array(vec![]));
    let (inserted,): (i32,) = sqlx::query_as("SELECT insert_telemetry_batch($1)")
        .bind(payload)
        .fetch_one(&mut *conn)
        .await?;
    Ok(inserted)
}

/// Broadcast the no-payload `telemetry_ingested` change notification after
/// a successful flush.
pub async fn notify_ingested(conn: &mut PgConnection) -> GatewayResult<()> {
    sqlx::query("SELECT pg_notify('telemetry_ingested', '')")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Fetch the most recent sample of a metric for a device, used by the
/// anomaly and window-aggregation rule evaluators.
pub async fn recent_metric_samples(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric_key: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> GatewayResult<Vec<(chrono::DateTime<chrono::Utc>, f64)>> {
    let rows: Vec<(chrono::DateTime<chrono::Utc>, Option<f64>)> = sqlx::query_as(
        "SELECT time, (metrics->>$3)::double precision \
         FROM telemetry \
         WHERE tenant_id = $1 AND device_id = $2 AND time >= $4 AND metrics ? $3 \
         ORDER BY time DESC",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(metric_key)
    .bind(since)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(t, v)| v.map(|v| (t, v)))
        .collect())
}

/// Fetch the latest value of a metric for a device, used by threshold and
/// multi-condition evaluation.
pub async fn latest_metric_value(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    metric_key: &str,
) -> GatewayResult<Option<f64>> {
    let row: Option<(Option<f64>,)> = sqlx::query_as(
        "SELECT (metrics->>$3)::double precision FROM telemetry \
         WHERE tenant_id = $1 AND device_id = $2 AND metrics ? $3 \
         ORDER BY time DESC LIMIT 1",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(metric_key)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.and_then(|(v,)| v))
}
