//! Device registry queries.

use pulse_protocol::device::{Device, DeviceStatus};
use sqlx::PgConnection;
use sqlx::Row;

use crate::error::GatewayResult;

/// Look up a device by its provision-token hash's owning key, used by
/// ingest's CONNECT auth probe.
pub async fn find_for_connect(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
) -> GatewayResult<Option<Device>> {
    let row = sqlx::query(
        "SELECT tenant_id, device_id, serial, mac_address, model, firmware_version, \
         template_id, tier, sensor_limit, provision_token_hash, status, created_at \
         FROM device_registry WHERE tenant_id = $1 AND device_id = $2",
    )
    .bind(tenant_id)
    .bind(device_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| Device {
        tenant_id: row.get("tenant_id"),
        device_id: row.get("device_id"),
        serial: row.get("serial"),
        mac_address: row.get("mac_address"),
        model: row.get("model"),
        firmware_version: row.get("firmware_version"),
        template_id: row.get("template_id"),
        tier: row.get("tier"),
        sensor_limit: row.get::<Option<i32>, _>("sensor_limit").map(|v| v as u32),
        provision_token_hash: row.get("provision_token_hash"),
        status: parse_status(row.get("status")),
        created_at: row.get("created_at"),
    }))
}

fn parse_status(raw: String) -> DeviceStatus {
    match raw.as_str() {
        "SUSPENDED" => DeviceStatus::Suspended,
        "EXPIRED" => DeviceStatus::Expired,
        _ => DeviceStatus::Active,
    }
}

/// The tier's default sensor cap, used to resolve the effective limit
/// when a device has no per-device override.
pub async fn tier_default_sensor_limit(
    conn: &mut PgConnection,
    tier: &str,
) -> GatewayResult<Option<u32>> {
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT default_sensor_limit FROM tier_catalog WHERE tier = $1",
    )
    .bind(tier)
    .fetch_optional(&mut *conn)
    .await
    .unwrap_or(None);

    Ok(row.map(|(v,)| v as u32))
}

/// Every device registered for a tenant, the evaluator's per-tick
/// rule-scoping input.
pub async fn list_for_tenant(conn: &mut PgConnection, tenant_id: &str) -> GatewayResult<Vec<Device>> {
    let rows = sqlx::query(
        "SELECT tenant_id, device_id, serial, mac_address, model, firmware_version, \
         template_id, tier, sensor_limit, provision_token_hash, status, created_at \
         FROM device_registry WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Device {
            tenant_id: row.get("tenant_id"),
            device_id: row.get("device_id"),
            serial: row.get("serial"),
            mac_address: row.get("mac_address"),
            model: row.get("model"),
            firmware_version: row.get("firmware_version"),
            template_id: row.get("template_id"),
            tier: row.get("tier"),
            sensor_limit: row.get::<Option<i32>, _>("sensor_limit").map(|v| v as u32),
            provision_token_hash: row.get("provision_token_hash"),
            status: parse_status(row.get("status")),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Every tenant with at least one registered device — the evaluator and
/// routing engine's tenant-discovery query. Requires an operator-scoped
/// connection since it spans every tenant.
pub async fn distinct_tenant_ids(conn: &mut PgConnection) -> GatewayResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT tenant_id FROM device_registry")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(t,)| t).collect())
}

/// Membership of a device in rule-scoping groups, used by `AlertRule::in_scope`.
pub async fn device_group_ids(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: &str,
) -> GatewayResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT group_id FROM device_group_membership WHERE tenant_id = $1 AND device_id = $2",
    )
    .bind(tenant_id)
    .bind(device_id)
    .fetch_all(&mut *conn)
    .await
    .unwrap_or_default();

    Ok(rows.into_iter().map(|(g,)| g).collect())
}
