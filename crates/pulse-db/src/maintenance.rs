//! Maintenance-window (silencing) queries.
//!
//! A maintenance window suppresses new alert opens for the device/group/
//! tenant it covers; it does not close already-open alerts and does not
//! pause gap-detection's suppression flag (`spec.md` §4.3).

use sqlx::PgConnection;

use crate::error::GatewayResult;

/// Whether `device_id` (a member of `group_ids`) is currently silenced by
/// an active maintenance window.
pub async fn is_device_silenced(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    group_ids: &[String],
    now: chrono::DateTime<chrono::Utc>,
) -> GatewayResult<bool> {
    let (silenced,): (bool,) = sqlx::query_as(
        "SELECT EXISTS( \
           SELECT 1 FROM maintenance_window \
           WHERE tenant_id = $1 AND starts_at <= $4 AND ends_at >= $4 \
             AND (device_id = $2 OR (device_id IS NULL AND (group_id IS NULL OR group_id = ANY($3)))) \
         )",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(group_ids)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(silenced)
}
