//! Connectivity rollup: derive `ONLINE`/`STALE`/`OFFLINE` for every device
//! in a tenant from its last heartbeat and persist transitions.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::debug;

use pulse_protocol::device::DeviceState;

use crate::config::EvalConfig;
use crate::error::EvalResult;

/// Refresh connectivity for every device rollup row of `tenant_id`,
/// writing only the rows whose derived state actually changed
/// (`set_connectivity` is a no-op UPDATE otherwise).
pub async fn refresh_tenant(conn: &mut PgConnection, tenant_id: &str, config: &EvalConfig) -> EvalResult<usize> {
    let now = Utc::now();
    let states = pulse_db::device_state::rollup_for_tenant(conn, tenant_id).await?;
    let mut changed = 0;

    for state in states {
        let derived = DeviceState::derive_connectivity(
            state.last_heartbeat_at,
            now,
            config.stale_threshold_secs,
            config.offline_threshold_secs,
        );
        if derived != state.connectivity {
            pulse_db::device_state::set_connectivity(conn, tenant_id, &state.device_id, derived, now).await?;
            debug!(tenant_id, device_id = %state.device_id, ?derived, "connectivity changed");
            changed += 1;
        }
    }

    Ok(changed)
}
