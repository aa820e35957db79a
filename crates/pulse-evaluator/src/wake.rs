//! Reactive wake-up wiring: `LISTEN` on `telemetry_ingested` and
//! `rules_changed`, invalidating caches and nudging the tick loop to run
//! a pass sooner than the next periodic interval (`spec.md` §4.3's
//! "evaluation is triggered both periodically and reactively").

use std::time::Duration;

use tokio::sync::watch;

use crate::context::EvaluatorContext;

/// Spawn the listener task. Returns a receiver that changes (its value is
/// a monotonically increasing counter, ignored by callers) every time a
/// wake-worthy notification arrives.
pub fn spawn(
    ctx: EvaluatorContext,
    database_url: String,
    shutdown_rx: watch::Receiver<bool>,
) -> (tokio::task::JoinHandle<()>, watch::Receiver<u64>) {
    let (wake_tx, wake_rx) = watch::channel(0u64);

    let handle = tokio::spawn(async move {
        let backoff = Duration::from_secs(ctx.config.listener_backoff_secs);
        let result = pulse_db::listen::run_listener(
            &database_url,
            &["telemetry_ingested", "rules_changed"],
            backoff,
            shutdown_rx,
            |notification| {
                if notification.channel == "rules_changed" {
                    let tenant_id = notification.payload.trim();
                    if tenant_id.is_empty() {
                        ctx.rule_cache.invalidate_all();
                    } else {
                        ctx.rule_cache.invalidate(tenant_id);
                    }
                }
                wake_tx.send_modify(|counter| *counter = counter.wrapping_add(1));
            },
        )
        .await;

        if let Err(err) = result {
            tracing::error!(error = %err, "evaluator listener task exited");
        }
    });

    (handle, wake_rx)
}
