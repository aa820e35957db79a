//! Delivery worker pool (`spec.md` §4.5): a bounded pool of workers, each
//! running claim → dispatch → settle in a loop against the shared job
//! queue.

use std::time::Duration;

use pulse_db::TenantRole;
use pulse_protocol::channel::{AlertPayload, JobStatus, NotificationJob, SendOutcome};
use rand::Rng;
use tokio::sync::watch;
use uuid::Uuid;

use crate::context::NotifyContext;

/// Spawn `worker_count` worker loops, each polling for claimable jobs on
/// its own interval. Returns their join handles so `main.rs` can await a
/// graceful shutdown.
pub fn spawn_pool(ctx: NotifyContext, shutdown_rx: watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
    (0..ctx.config.worker_count)
        .map(|id| {
            let ctx = ctx.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(worker_loop(id, ctx, shutdown_rx))
        })
        .collect()
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

async fn worker_loop(id: u32, ctx: NotifyContext, mut shutdown_rx: watch::Receiver<bool>) {
    let owner_token = Uuid::new_v4();
    tracing::info!(worker_id = id, %owner_token, "delivery worker started");

    loop {
        if *shutdown_rx.borrow() {
            release_claim(&ctx, owner_token).await;
            return;
        }

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    release_claim(&ctx, owner_token).await;
                    return;
                }
            }

            claimed = claim_next(&ctx, owner_token) => {
                match claimed {
                    Some(job) => process_job(&ctx, job).await,
                    None => tokio::time::sleep(POLL_INTERVAL).await,
                }
            }
        }
    }
}

async fn claim_next(ctx: &NotifyContext, owner_token: Uuid) -> Option<NotificationJob> {
    let mut conn = ctx.gateway.acquire_scoped("_operator_", TenantRole::Operator).await.ok()?;
    pulse_db::jobs::claim_one(&mut conn, owner_token).await.ok().flatten()
}

/// Graceful-shutdown path: release this worker's in-flight claim back to
/// `PENDING` for immediate redelivery (`spec.md` §5).
async fn release_claim(ctx: &NotifyContext, owner_token: Uuid) {
    if let Ok(mut conn) = ctx.gateway.acquire_scoped("_operator_", TenantRole::Operator).await {
        if let Err(err) = pulse_db::jobs::release_in_flight(&mut conn, owner_token).await {
            tracing::warn!(error = %err, "failed to release in-flight job on shutdown");
        }
    }
}

async fn process_job(ctx: &NotifyContext, job: NotificationJob) {
    let _permit = ctx.send_permits.acquire().await.expect("send permit semaphore is never closed");

    let mut conn = match ctx.gateway.acquire_scoped(&job.tenant_id, TenantRole::IotService).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!(job_id = %job.id, error = %err, "failed to acquire connection to settle job");
            return;
        }
    };

    let channel = match pulse_db::channels::find(&mut conn, &job.tenant_id, job.channel_id).await {
        Ok(channel) => channel,
        Err(err) => {
            tracing::warn!(job_id = %job.id, error = %err, "failed to load channel for job");
            let _ = pulse_db::jobs::mark_retry(&mut conn, job.id, chrono::Utc::now(), &err.to_string()).await;
            return;
        }
    };

    let Some(channel) = channel else {
        tracing::warn!(job_id = %job.id, channel_id = %job.channel_id, "channel not found, dead-lettering job");
        dead_letter(&mut conn, &job, "channel not found").await;
        return;
    };

    if !channel.enabled {
        if let Err(err) = pulse_db::jobs::mark_completed(&mut conn, job.id).await {
            tracing::warn!(job_id = %job.id, error = %err, "failed to mark disabled-channel job completed");
        }
        return;
    }

    let payload: AlertPayload = match serde_json::from_value(job.payload.clone()) {
        Ok(payload) => payload,
        Err(err) => {
            dead_letter(&mut conn, &job, &format!("malformed job payload: {err}")).await;
            return;
        }
    };

    let outcome = ctx
        .dispatcher
        .dispatch(channel.channel_type, &payload, &channel.config, job.trigger_event)
        .await;

    match outcome {
        SendOutcome::Ok => {
            if let Err(err) = pulse_db::jobs::mark_completed(&mut conn, job.id).await {
                tracing::warn!(job_id = %job.id, error = %err, "failed to mark job completed");
            }
        }
        SendOutcome::Permanent(reason) => {
            tracing::warn!(job_id = %job.id, channel_id = %job.channel_id, reason, "permanent send failure, dead-lettering");
            dead_letter(&mut conn, &job, &reason).await;
        }
        SendOutcome::Transient(reason) => {
            if job.attempt_count + 1 >= ctx.config.worker_max_attempts {
                tracing::warn!(job_id = %job.id, channel_id = %job.channel_id, reason, "retries exhausted, dead-lettering");
                dead_letter(&mut conn, &job, &reason).await;
            } else {
                let jitter_unit = rand::thread_rng().gen_range(-1.0..=1.0);
                let delay_secs = pulse_protocol::channel::backoff_duration_secs(job.attempt_count + 1, jitter_unit);
                let next_attempt_at = chrono::Utc::now() + chrono::Duration::milliseconds((delay_secs * 1000.0) as i64);
                if let Err(err) = pulse_db::jobs::mark_retry(&mut conn, job.id, next_attempt_at, &reason).await {
                    tracing::warn!(job_id = %job.id, error = %err, "failed to mark job for retry");
                }
            }
        }
    }
}

async fn dead_letter(conn: &mut sqlx::PgConnection, job: &NotificationJob, reason: &str) {
    if let Err(err) = pulse_db::jobs::mark_failed(conn, job.id, reason).await {
        tracing::warn!(job_id = %job.id, error = %err, "failed to mark job failed");
        return;
    }
    if let Err(err) =
        pulse_db::dead_letters::write(conn, &job.tenant_id, job.id, job.alert_id, job.channel_id, &job.payload, reason).await
    {
        tracing::warn!(job_id = %job.id, error = %err, "failed to write dead-letter record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_values_round_trip() {
        assert_eq!(JobStatus::Pending, JobStatus::Pending);
    }
}
