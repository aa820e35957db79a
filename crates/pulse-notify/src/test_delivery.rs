//! Synchronous test-delivery path (`spec.md` §4.5): bypasses the job
//! queue entirely, building a canned payload marked `_test=true` and
//! invoking the channel's sender directly. Rate-limited to 5 per tenant
//! per minute via the DB-backed counter in `pulse_db::test_delivery`,
//! since this call may be served by any worker process.

use chrono::Utc;
use pulse_db::TenantRole;
use pulse_protocol::channel::{AlertPayload, SendOutcome, TriggerEvent};
use uuid::Uuid;

use crate::context::NotifyContext;
use crate::error::{NotifyError, NotifyResult};

/// Send a synthetic test alert through `channel_id`, bypassing the
/// delivery queue. Returns the sender's raw outcome so the (external)
/// API layer can surface pass/fail to the operator immediately.
pub async fn send_test(ctx: &NotifyContext, tenant_id: &str, channel_id: Uuid) -> NotifyResult<SendOutcome> {
    let mut conn = ctx.gateway.acquire_scoped(tenant_id, TenantRole::Tenant).await?;

    if !pulse_db::test_delivery::try_consume(&mut conn, tenant_id, Utc::now()).await? {
        return Err(NotifyError::RateLimited);
    }

    let channel = pulse_db::channels::find(&mut conn, tenant_id, channel_id)
        .await?
        .ok_or(NotifyError::ChannelUnavailable)?;

    if !channel.enabled {
        return Err(NotifyError::ChannelUnavailable);
    }

    let payload = canned_payload(tenant_id);
    let outcome = ctx.dispatcher.dispatch(channel.channel_type, &payload, &channel.config, TriggerEvent::Open).await;
    Ok(outcome)
}

fn canned_payload(tenant_id: &str) -> AlertPayload {
    AlertPayload {
        alert_id: Uuid::new_v4(),
        tenant_id: tenant_id.to_string(),
        device_id: "test-device".to_string(),
        severity: 3,
        alert_type: "test_delivery".to_string(),
        summary: "This is a test notification from OpsConductor Pulse".to_string(),
        details: serde_json::json!({}),
        triggered_at: Utc::now(),
        site_id: None,
        _test: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canned_payload_marks_test_flag() {
        let payload = canned_payload("acme");
        assert_eq!(payload._test, Some(true));
        assert_eq!(payload.tenant_id, "acme");
    }
}
