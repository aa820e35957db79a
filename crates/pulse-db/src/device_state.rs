//! Device rollup (`device_state`) queries.

use pulse_protocol::device::{DeviceConnectivity, DeviceState};
use sqlx::PgConnection;
use sqlx::Row;

use crate::error::GatewayResult;

/// Upsert the last-heartbeat timestamp for a device.
pub async fn touch_heartbeat(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    at: chrono::DateTime<chrono::Utc>,
) -> GatewayResult<()> {
    sqlx::query(
        "INSERT INTO device_state (tenant_id, device_id, last_heartbeat_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (tenant_id, device_id) DO UPDATE SET last_heartbeat_at = EXCLUDED.last_heartbeat_at",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Upsert the last-telemetry timestamp for a device.
pub async fn touch_telemetry(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    at: chrono::DateTime<chrono::Utc>,
) -> GatewayResult<()> {
    sqlx::query(
        "INSERT INTO device_state (tenant_id, device_id, last_telemetry_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (tenant_id, device_id) DO UPDATE SET last_telemetry_at = EXCLUDED.last_telemetry_at",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Persist a derived connectivity change, stamping `last_state_change_at`.
pub async fn set_connectivity(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
    connectivity: DeviceConnectivity,
    now: chrono::DateTime<chrono::Utc>,
) -> GatewayResult<()> {
    let value = match connectivity {
        DeviceConnectivity::Online => "ONLINE",
        DeviceConnectivity::Stale => "STALE",
        DeviceConnectivity::Offline => "OFFLINE",
    };
    sqlx::query(
        "UPDATE device_state SET connectivity = $3, last_state_change_at = $4 \
         WHERE tenant_id = $1 AND device_id = $2 AND connectivity IS DISTINCT FROM $3",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(value)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Every device rollup row for a tenant, the evaluator's per-tick work unit.
pub async fn rollup_for_tenant(
    conn: &mut PgConnection,
    tenant_id: &str,
) -> GatewayResult<Vec<DeviceState>> {
    let rows = sqlx::query(
        "SELECT tenant_id, device_id, last_heartbeat_at, last_telemetry_at, connectivity, last_state_change_at \
         FROM device_state WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| DeviceState {
            tenant_id: row.get("tenant_id"),
            device_id: row.get("device_id"),
            last_heartbeat_at: row.get("last_heartbeat_at"),
            last_telemetry_at: row.get("last_telemetry_at"),
            connectivity: match row.get::<String, _>("connectivity").as_str() {
                "ONLINE" => DeviceConnectivity::Online,
                "STALE" => DeviceConnectivity::Stale,
                _ => DeviceConnectivity::Offline,
            },
            last_state_change_at: row.get("last_state_change_at"),
        })
        .collect())
}
