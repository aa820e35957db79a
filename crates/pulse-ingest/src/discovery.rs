//! Sensor auto-discovery: insert a sensor row for every metric key not
//! previously seen on a device, enforcing the effective sensor limit
//! (`spec.md` §4.1/§4.2).

use pulse_db::Gateway;
use pulse_protocol::device::Device;
use pulse_protocol::telemetry::TelemetryRow;

use crate::error::IngestResult;

/// Discover any new sensors in `row.metrics`, skipping (and logging) keys
/// that would push the device over its effective sensor limit. Never
/// rejects the telemetry row itself.
pub async fn discover_sensors(gateway: &Gateway, device: &Device, row: &TelemetryRow) -> IngestResult<()> {
    let mut conn = gateway
        .acquire_scoped(&row.tenant_id, pulse_db::TenantRole::IotService)
        .await?;

    let tier_default = pulse_db::devices::tier_default_sensor_limit(&mut conn, &device.tier).await?;
    let limit = device.effective_sensor_limit(tier_default);

    for metric_key in row.metrics.keys() {
        if pulse_db::sensors::exists(&mut conn, &row.tenant_id, &row.device_id, metric_key).await? {
            continue;
        }

        let count = pulse_db::sensors::count_for_device(&mut conn, &row.tenant_id, &row.device_id).await?;
        if count as u32 >= limit {
            tracing::warn!(
                tenant_id = %row.tenant_id,
                device_id = %row.device_id,
                metric_key,
                limit,
                "sensor limit reached, skipping discovery for metric"
            );
            continue;
        }

        pulse_db::sensors::insert_discovered(&mut conn, &row.tenant_id, &row.device_id, metric_key).await?;
    }

    for (metric_key, value) in &row.metrics {
        let json_value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        pulse_db::sensors::touch(&mut conn, &row.tenant_id, &row.device_id, metric_key, &json_value, row.time)
            .await?;
    }

    Ok(())
}
