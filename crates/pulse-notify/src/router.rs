//! Routing engine (`spec.md` §4.4): matches alert transitions against
//! per-tenant routing rules and enqueues a `notification_job` for each
//! match. A pure producer — it never performs delivery itself.
//!
//! Triggered by the `alerts_changed` reactive wake-up and a 60-second
//! safety sweep (`main.rs`), both of which call [`run_tenant`] with a
//! generous fixed lookback window rather than tracked per-tenant
//! watermarks: enqueueing is idempotent on
//! `(tenant_id, alert_id, channel_id, trigger_event)`, so re-scanning the
//! same transition twice after a reactive wake and the following sweep
//! is a harmless no-op, not a correctness risk.

use chrono::{Duration as ChronoDuration, Utc};
use pulse_db::TenantRole;
use pulse_protocol::alert::{Alert, AlertStatus};
use pulse_protocol::channel::{AlertPayload, TriggerEvent};

use crate::context::NotifyContext;
use crate::error::NotifyResult;

/// How far back a single pass looks for alert transitions. Generous
/// relative to the 60s safety-sweep interval so a missed reactive wake
/// (e.g. a brief listener reconnect) is still caught by the next sweep.
const LOOKBACK: ChronoDuration = ChronoDuration::minutes(5);

pub async fn run_tenant(ctx: &NotifyContext, tenant_id: &str) -> NotifyResult<usize> {
    let mut conn = ctx.gateway.acquire_scoped(tenant_id, TenantRole::IotService).await?;
    let since = Utc::now() - LOOKBACK;

    let rules = pulse_db::routing::active_for_tenant(&mut conn, tenant_id).await?;
    if rules.is_empty() {
        return Ok(0);
    }

    let transitioned = pulse_db::alerts::recently_transitioned(&mut conn, tenant_id, since).await?;
    let mut enqueued = 0usize;

    for alert in &transitioned {
        let Some(trigger_event) = trigger_event_for(alert) else {
            continue;
        };

        let payload = to_payload(alert, trigger_event == TriggerEvent::Close);
        let payload_json = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(tenant_id, alert_id = %alert.id, error = %err, "failed to serialize alert payload");
                continue;
            }
        };

        for rule in rules.iter().filter(|r| r.matches(alert.severity, &alert.alert_type, &[])) {
            if let Err(err) =
                pulse_db::jobs::enqueue(&mut conn, tenant_id, alert.id, rule.channel_id, trigger_event, &payload_json).await
            {
                tracing::warn!(tenant_id, alert_id = %alert.id, channel_id = %rule.channel_id, error = %err, "failed to enqueue notification job");
                continue;
            }
            enqueued += 1;
        }
    }

    Ok(enqueued)
}

/// Which trigger event a transitioned alert row represents. `ACK` is not
/// produced here: acknowledgement is an operator action outside this
/// core's scope (`spec.md` §1), and `fleet_alert` carries no
/// `acknowledged_at` watermark for this query to detect it from.
fn trigger_event_for(alert: &Alert) -> Option<TriggerEvent> {
    match alert.status {
        AlertStatus::Open => Some(TriggerEvent::Open),
        AlertStatus::Closed => Some(TriggerEvent::Close),
        AlertStatus::Acknowledged => None,
    }
}

/// Build the outbound envelope snapshot stored on the job and sent to
/// channels (`spec.md` §6). `fleet_alert` carries no `site_id` in the
/// data model (`spec.md` §3), so it's always `None` here.
fn to_payload(alert: &Alert, is_close: bool) -> AlertPayload {
    AlertPayload {
        alert_id: alert.id,
        tenant_id: alert.tenant_id.clone(),
        device_id: alert.device_id.clone(),
        severity: alert.severity,
        alert_type: alert.alert_type.clone(),
        summary: alert.summary.clone(),
        details: alert.details.clone(),
        triggered_at: if is_close { alert.closed_at.unwrap_or(alert.opened_at) } else { alert.opened_at },
        site_id: None,
        _test: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_alert(status: AlertStatus) -> Alert {
        Alert {
            id: Uuid::nil(),
            tenant_id: "acme".into(),
            fingerprint: "RULE:x:dev-1".into(),
            rule_id: None,
            device_id: "dev-1".into(),
            alert_type: "temp_high".into(),
            severity: 4,
            status,
            opened_at: Utc::now(),
            closed_at: None,
            summary: "temp too high".into(),
            details: serde_json::json!({}),
        }
    }

    #[test]
    fn open_alert_maps_to_open_trigger() {
        assert_eq!(trigger_event_for(&sample_alert(AlertStatus::Open)), Some(TriggerEvent::Open));
    }

    #[test]
    fn closed_alert_maps_to_close_trigger() {
        assert_eq!(trigger_event_for(&sample_alert(AlertStatus::Closed)), Some(TriggerEvent::Close));
    }

    #[test]
    fn acknowledged_alert_has_no_trigger() {
        assert_eq!(trigger_event_for(&sample_alert(AlertStatus::Acknowledged)), None);
    }

    #[test]
    fn payload_uses_opened_at_for_open_trigger() {
        let alert = sample_alert(AlertStatus::Open);
        let payload = to_payload(&alert, false);
        assert_eq!(payload.triggered_at, alert.opened_at);
    }
}
