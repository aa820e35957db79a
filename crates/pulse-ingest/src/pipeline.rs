//! Per-message ingest pipeline: validate → rate-limit → sensor discovery
//! → device-state touch → batch buffer. Quarantines on any rejection.
//!
//! This is the single code path driven by both the live MQTT subscriber
//! (`mqtt_loop::run`) and the test harness, so unit tests exercise the
//! real dispatch logic without a broker.

use chrono::Utc;
use pulse_db::{Gateway, TenantRole};
use pulse_mqtt::IncomingMessage;
use pulse_protocol::telemetry::MsgType;

use crate::batcher::Batcher;
use crate::context::IngestContext;
use crate::discovery;
use crate::error::{IngestError, IngestResult};
use crate::validate;

/// Handle one classified MQTT message end to end. Never returns an
/// `Err` the caller must act on beyond logging — every rejection path
/// already wrote its own quarantine event.
pub async fn handle_message(context: &IngestContext, batcher: &Batcher, message: IncomingMessage) {
    match message {
        IncomingMessage::Telemetry { tenant_id, device_id, payload } => {
            process(context, batcher, &tenant_id, &device_id, MsgType::Telemetry, &payload, "telemetry").await;
        }
        IncomingMessage::Heartbeat { tenant_id, device_id, payload } => {
            process(context, batcher, &tenant_id, &device_id, MsgType::Heartbeat, &payload, "heartbeat").await;
        }
        IncomingMessage::Event { tenant_id, device_id, payload } => {
            process(context, batcher, &tenant_id, &device_id, MsgType::Event, &payload, "event").await;
        }
        IncomingMessage::ShadowOrAck { tenant_id, device_id, topic_kind, payload } => {
            process(context, batcher, &tenant_id, &device_id, MsgType::Event, &payload, topic_kind).await;
        }
        IncomingMessage::Unparseable { topic, .. } => {
            tracing::debug!(topic, "dropping message on unparseable topic");
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn process(
    context: &IngestContext,
    batcher: &Batcher,
    tenant_id: &str,
    device_id: &str,
    msg_type: MsgType,
    payload: &[u8],
    topic_label: &str,
) {
    if !context.rate_limiter.try_consume(tenant_id, device_id) {
        quarantine(&context.gateway, tenant_id, device_id, topic_label, "rate_limited", None).await;
        return;
    }

    if let Err(err) = check_payload_tenant_device_match(tenant_id, device_id, payload) {
        quarantine(&context.gateway, tenant_id, device_id, topic_label, "tenant_device_mismatch", Some(&err)).await;
        return;
    }

    let (row, health) = match validate::validate(
        tenant_id,
        device_id,
        msg_type,
        payload,
        context.config.max_payload_bytes,
        None,
        &context.seq_tracker,
    ) {
        Ok(result) => result,
        Err(IngestError::Validation(reason)) => {
            quarantine(&context.gateway, tenant_id, device_id, topic_label, "validation_failed", Some(&reason)).await;
            return;
        }
        Err(other) => {
            tracing::error!(tenant_id, device_id, error = %other, "unexpected ingest error");
            return;
        }
    };

    if let Ok(device) = load_device(&context.gateway, tenant_id, device_id).await {
        if let Some(device) = device {
            if let Err(err) = discovery::discover_sensors(&context.gateway, &device, &row).await {
                tracing::warn!(tenant_id, device_id, error = %err, "sensor discovery failed");
            }
        }
    }

    touch_device_state(&context.gateway, tenant_id, device_id, msg_type).await;

    if batcher.push_telemetry(row) {
        batcher.flush(&context.gateway).await;
    }
    if let Some(health_row) = health {
        batcher.push_health(health_row);
    }
}

/// The topic's tenant/device segments are authoritative; if the payload
/// also carries `tenant_id`/`device_id` keys they must agree (`spec.md`
/// §4.2).
fn check_payload_tenant_device_match(tenant_id: &str, device_id: &str, payload: &[u8]) -> IngestResult<()> {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(payload) else {
        return Ok(());
    };
    if let Some(payload_tenant) = value.get("tenant_id").and_then(|v| v.as_str()) {
        if payload_tenant != tenant_id {
            return Err(IngestError::Validation(format!(
                "payload tenant_id '{payload_tenant}' does not match topic tenant '{tenant_id}'"
            )));
        }
    }
    if let Some(payload_device) = value.get("device_id").and_then(|v| v.as_str()) {
        if payload_device != device_id {
            return Err(IngestError::Validation(format!(
                "payload device_id '{payload_device}' does not match topic device '{device_id}'"
            )));
        }
    }
    Ok(())
}

async fn load_device(
    gateway: &Gateway,
    tenant_id: &str,
    device_id: &str,
) -> IngestResult<Option<pulse_protocol::device::Device>> {
    let mut conn = gateway.acquire_scoped(tenant_id, TenantRole::IotService).await?;
    Ok(pulse_db::devices::find_for_connect(&mut conn, tenant_id, device_id).await?)
}

async fn touch_device_state(gateway: &Gateway, tenant_id: &str, device_id: &str, msg_type: MsgType) {
    let Ok(mut conn) = gateway.acquire_scoped(tenant_id, TenantRole::IotService).await else {
        return;
    };
    let now = Utc::now();
    let result = match msg_type {
        MsgType::Heartbeat => pulse_db::device_state::touch_heartbeat(&mut conn, tenant_id, device_id, now).await,
        _ => pulse_db::device_state::touch_telemetry(&mut conn, tenant_id, device_id, now).await,
    };
    if let Err(err) = result {
        tracing::warn!(tenant_id, device_id, error = %err, "failed to update device rollup state");
    }
}

/// Quarantine writes are best-effort and must never affect live ingest
/// (`spec.md` §4.2) — failures here are only logged.
async fn quarantine(
    gateway: &Gateway,
    tenant_id: &str,
    device_id: &str,
    topic: &str,
    reason: &str,
    detail: Option<&str>,
) {
    tracing::warn!(tenant_id, device_id, topic, reason, "message quarantined");
    let Ok(mut conn) = gateway.acquire_scoped(tenant_id, TenantRole::IotService).await else {
        return;
    };
    if let Err(err) = pulse_db::quarantine::record(&mut conn, tenant_id, Some(device_id), Some(topic), reason, detail).await {
        tracing::error!(tenant_id, device_id, error = %err, "failed to record quarantine event");
    }
}
