//! Dead-letter record queries.

use pulse_protocol::channel::DeadLetterRecord;
use sqlx::PgConnection;
use sqlx::Row;
use uuid::Uuid;

use crate::error::GatewayResult;

pub async fn write(
    conn: &mut PgConnection,
    tenant_id: &str,
    job_id: Uuid,
    alert_id: Uuid,
    channel_id: Uuid,
    payload: &serde_json::Value,
    last_error: &str,
) -> GatewayResult<()> {
    sqlx::query(
        "INSERT INTO dead_letter (tenant_id, job_id, alert_id, channel_id, payload, last_error) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(tenant_id)
    .bind(job_id)
    .bind(alert_id)
    .bind(channel_id)
    .bind(payload)
    .bind(last_error)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// List dead letters for a tenant, newest first, for operator/tenant triage.
pub async fn list_for_tenant(
    conn: &mut PgConnection,
    tenant_id: &str,
) -> GatewayResult<Vec<DeadLetterRecord>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, job_id, alert_id, channel_id, payload, last_error, created_at \
         FROM dead_letter WHERE tenant_id = $1 ORDER BY created_at DESC",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| DeadLetterRecord {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            job_id: row.get("job_id"),
            alert_id: row.get("alert_id"),
            channel_id: row.get("channel_id"),
            payload: row.get("payload"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
        })
        .collect())
}
