//! Quarantine event queries — audit rows for rejected inbound messages.
//!
//! Writes here are best-effort: a failure to persist a quarantine event
//! must never affect live ingest (`spec.md` §4.2's failure taxonomy).

use sqlx::PgConnection;

use crate::error::GatewayResult;

pub async fn record(
    conn: &mut PgConnection,
    tenant_id: &str,
    device_id: Option<&str>,
    topic: Option<&str>,
    reason: &str,
    detail: Option<&str>,
) -> GatewayResult<()> {
    sqlx::query(
        "INSERT INTO quarantine_event (tenant_id, device_id, topic, reason, detail) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(tenant_id)
    .bind(device_id)
    .bind(topic)
    .bind(reason)
    .bind(detail)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
