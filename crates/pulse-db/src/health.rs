//! Platform-health batch-write queries.

use pulse_protocol::telemetry::PlatformHealthRow;
use sqlx::PgConnection;

use crate::error::GatewayResult;

/// Invoke `insert_device_health_batch(rows jsonb_array)`, returning the
/// inserted row count.
pub async fn insert_batch(
    conn: &mut PgConnection,
    rows: &[PlatformHealthRow],
) -> GatewayResult<i32> {
    let payload = serde_json::to_value(rows).unwrap_or(serde_json::Value::Array(vec![]));
    let (inserted,): (i32,) = sqlx::query_as("SELECT insert_device_health_batch($1)")
        .bind(payload)
        .fetch_one(&mut *conn)
        .await?;
    Ok(inserted)
}
