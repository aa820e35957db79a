//! Notification job queue queries.

use pulse_protocol::channel::{JobStatus, NotificationJob, TriggerEvent};
use sqlx::PgConnection;
use sqlx::Row;
use uuid::Uuid;

use crate::error::GatewayResult;

/// Enqueue a job for one `(alert, channel)` pair on an alert transition.
/// Idempotent: the unique index on `(tenant_id, alert_id, channel_id,
/// trigger_event)` means a duplicate call is a no-op.
pub async fn enqueue(
    conn: &mut PgConnection,
    tenant_id: &str,
    alert_id: Uuid,
    channel_id: Uuid,
    trigger_event: TriggerEvent,
    payload: &serde_json::Value,
) -> GatewayResult<()> {
    sqlx::query(
        "INSERT INTO notification_job (tenant_id, alert_id, channel_id, trigger_event, payload) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (tenant_id, alert_id, channel_id, trigger_event) DO NOTHING",
    )
    .bind(tenant_id)
    .bind(alert_id)
    .bind(channel_id)
    .bind(trigger_event_str(trigger_event))
    .bind(payload)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Re-enqueue a fresh job for the same `(alert_id, channel_id)` from a
/// dead letter, without re-running the routing match — the decided
/// semantics for dead-letter replay (see `SPEC_FULL.md` §9b).
pub async fn requeue_from_dead_letter(
    conn: &mut PgConnection,
    tenant_id: &str,
    alert_id: Uuid,
    channel_id: Uuid,
    payload: &serde_json::Value,
) -> GatewayResult<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO notification_job (tenant_id, alert_id, channel_id, trigger_event, payload) \
         VALUES ($1, $2, $3, 'OPEN', $4) \
         RETURNING id",
    )
    .bind(tenant_id)
    .bind(alert_id)
    .bind(channel_id)
    .bind(payload)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Atomically claim one due `PENDING` job, per the delivery worker's
/// claim-with-`SKIP LOCKED` semantics.
pub async fn claim_one(
    conn: &mut PgConnection,
    owner_token: Uuid,
) -> GatewayResult<Option<NotificationJob>> {
    let row = sqlx::query(
        "SELECT id, tenant_id, alert_id, channel_id, trigger_event, status, attempt_count, \
         next_attempt_at, payload, last_error, owner_token \
         FROM claim_notification_job($1)",
    )
    .bind(owner_token)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(row_to_job))
}

pub async fn mark_completed(conn: &mut PgConnection, job_id: Uuid) -> GatewayResult<()> {
    sqlx::query("UPDATE notification_job SET status = 'COMPLETED' WHERE id = $1")
        .bind(job_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Re-`PENDING` a job after a transient failure, bumping the attempt count
/// and setting the backoff-computed `next_attempt_at`.
pub async fn mark_retry(
    conn: &mut PgConnection,
    job_id: Uuid,
    next_attempt_at: chrono::DateTime<chrono::Utc>,
    error: &str,
) -> GatewayResult<()> {
    sqlx::query(
        "UPDATE notification_job SET status = 'PENDING', attempt_count = attempt_count + 1, \
         next_attempt_at = $2, last_error = $3, owner_token = NULL WHERE id = $1",
    )
    .bind(job_id)
    .bind(next_attempt_at)
    .bind(error)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_failed(conn: &mut PgConnection, job_id: Uuid, error: &str) -> GatewayResult<()> {
    sqlx::query("UPDATE notification_job SET status = 'FAILED', last_error = $2 WHERE id = $1")
        .bind(job_id)
        .bind(error)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Graceful-shutdown path: release an in-flight claim back to `PENDING`
/// for immediate redelivery, rather than leaving it orphaned.
pub async fn release_in_flight(conn: &mut PgConnection, owner_token: Uuid) -> GatewayResult<()> {
    sqlx::query(
        "UPDATE notification_job SET status = 'PENDING', next_attempt_at = now(), owner_token = NULL \
         WHERE owner_token = $1 AND status = 'IN_FLIGHT'",
    )
    .bind(owner_token)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn trigger_event_str(event: TriggerEvent) -> &'static str {
    match event {
        TriggerEvent::Open => "OPEN",
        TriggerEvent::Close => "CLOSE",
        TriggerEvent::Ack => "ACK",
    }
}

fn row_to_job(row: sqlx::postgres::PgRow) -> NotificationJob {
    NotificationJob {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        alert_id: row.get("alert_id"),
        channel_id: row.get("channel_id"),
        trigger_event: match row.get::<String, _>("trigger_event").as_str() {
            "CLOSE" => TriggerEvent::Close,
            "ACK" => TriggerEvent::Ack,
            _ => TriggerEvent::Open,
        },
        status: match row.get::<String, _>("status").as_str() {
            "IN_FLIGHT" => JobStatus::InFlight,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Pending,
        },
        attempt_count: row.get::<i32, _>("attempt_count") as u32,
        next_attempt_at: row.get("next_attempt_at"),
        payload: row.get("payload"),
        last_error: row.get("last_error"),
        owner_token: row.get("owner_token"),
    }
}
