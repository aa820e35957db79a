//! Device registry and sensor domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Active,
    Suspended,
    Expired,
}

/// A tenant's device, keyed by `(tenant_id, device_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub tenant_id: String,
    pub device_id: String,
    pub serial: Option<String>,
    pub mac_address: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub template_id: Option<Uuid>,
    pub tier: String,
    /// Device-level override of the sensor cap; `None` defers to the tier default.
    pub sensor_limit: Option<u32>,
    pub provision_token_hash: String,
    pub status: DeviceStatus,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Resolve `device.sensor_limit ∨ tier.default_sensor_limit ∨ 20`.
    pub fn effective_sensor_limit(&self, tier_default: Option<u32>) -> u32 {
        self.sensor_limit.or(tier_default).unwrap_or(20)
    }

    pub fn is_connectable(&self) -> bool {
        matches!(self.status, DeviceStatus::Active)
    }
}

/// Auto-discovered sensor, keyed by `(tenant_id, device_id, metric_key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub tenant_id: String,
    pub device_id: String,
    pub metric_key: String,
    pub display_unit: Option<String>,
    pub range_min: Option<f64>,
    pub range_max: Option<f64>,
    pub precision: Option<u32>,
    pub last_value: Option<serde_json::Value>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Derived connectivity status computed by the evaluator's rollup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceConnectivity {
    Online,
    Stale,
    Offline,
}

/// One row per device: the latest-known rollup of heartbeat/telemetry state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    pub tenant_id: String,
    pub device_id: String,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub last_telemetry_at: Option<DateTime<Utc>>,
    pub connectivity: DeviceConnectivity,
    pub last_state_change_at: DateTime<Utc>,
}

impl DeviceState {
    /// Derive connectivity from the most recent heartbeat against the two
    /// configured thresholds. `now − last_heartbeat_at < stale_threshold` is
    /// `ONLINE`; `< offline_threshold` is `STALE`; otherwise `OFFLINE`.
    pub fn derive_connectivity(
        last_heartbeat_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        stale_threshold_secs: i64,
        offline_threshold_secs: i64,
    ) -> DeviceConnectivity {
        let Some(last) = last_heartbeat_at else {
            return DeviceConnectivity::Offline;
        };
        let age = (now - last).num_seconds();
        if age < stale_threshold_secs {
            DeviceConnectivity::Online
        } else if age < offline_threshold_secs {
            DeviceConnectivity::Stale
        } else {
            DeviceConnectivity::Offline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_sensor_limit_prefers_device_override() {
        let device = sample_device(Some(5));
        assert_eq!(device.effective_sensor_limit(Some(10)), 5);
    }

    #[test]
    fn effective_sensor_limit_falls_back_to_tier_then_default() {
        let device = sample_device(None);
        assert_eq!(device.effective_sensor_limit(Some(10)), 10);
        assert_eq!(device.effective_sensor_limit(None), 20);
    }

    #[test]
    fn connectivity_thresholds() {
        let now = Utc::now();
        let fresh = Some(now - chrono::Duration::seconds(5));
        assert_eq!(
            DeviceState::derive_connectivity(fresh, now, 60, 300),
            DeviceConnectivity::Online
        );

        let stale = Some(now - chrono::Duration::seconds(90));
        assert_eq!(
            DeviceState::derive_connectivity(stale, now, 60, 300),
            DeviceConnectivity::Stale
        );

        let offline = Some(now - chrono::Duration::seconds(600));
        assert_eq!(
            DeviceState::derive_connectivity(offline, now, 60, 300),
            DeviceConnectivity::Offline
        );

        assert_eq!(
            DeviceState::derive_connectivity(None, now, 60, 300),
            DeviceConnectivity::Offline
        );
    }

    fn sample_device(sensor_limit: Option<u32>) -> Device {
        Device {
            tenant_id: "acme".into(),
            device_id: "dev-1".into(),
            serial: None,
            mac_address: None,
            model: None,
            firmware_version: None,
            template_id: None,
            tier: "standard".into(),
            sensor_limit,
            provision_token_hash: "hash".into(),
            status: DeviceStatus::Active,
            created_at: Utc::now(),
        }
    }
}
