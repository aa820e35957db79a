//! `pulse-evaluatord` — rule evaluation and alert lifecycle binary.
//!
//! Wires the persistence gateway, the periodic/reactive tick loop, and
//! the health HTTP surface into one process, following the teacher's
//! `main.rs` shape: init tracing, load config, construct state, spawn
//! the concurrent loops, select on `ctrl_c` for graceful shutdown.

mod cache;
mod conditions;
mod config;
mod context;
mod error;
mod health;
mod lifecycle;
mod rollup;
mod tick;
mod tracker;
mod wake;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use config::EvalConfig;
use context::EvaluatorContext;
use pulse_db::{DatabaseConfig, Gateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pulse-evaluatord starting");

    let eval_config = EvalConfig::from_env();
    let db_config = DatabaseConfig::from_env();
    let health_port = eval_config.health_port;
    let eval_interval = Duration::from_secs(eval_config.eval_interval_secs);

    let gateway = Gateway::connect(&db_config).await?;
    let context = EvaluatorContext::new(gateway, eval_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (listener_task, wake_rx) = wake::spawn(context.clone(), db_config.database_url.clone(), shutdown_rx.clone());
    let tick_task = tokio::spawn(tick_loop(context.clone(), eval_interval, wake_rx, shutdown_rx.clone()));

    let router = health::build_router(context.clone());
    let listener = TcpListener::bind(("0.0.0.0", health_port)).await?;
    tracing::info!(port = health_port, "health server listening");

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "health server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tick_task.await;
    let _ = listener_task.await;

    tracing::info!("pulse-evaluatord shut down cleanly");
    Ok(())
}

/// Run an evaluation pass over every tenant, triggered by the periodic
/// interval or a reactive wake-up from `wake::spawn`, whichever comes
/// first.
async fn tick_loop(
    context: EvaluatorContext,
    interval: Duration,
    mut wake_rx: watch::Receiver<u64>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }

            _ = ticker.tick() => {
                run_all_tenants(&context).await;
            }

            _ = wake_rx.changed() => {
                run_all_tenants(&context).await;
            }
        }
    }
}

async fn run_all_tenants(context: &EvaluatorContext) {
    let mut conn = match context.gateway.acquire_scoped("_operator_", pulse_db::TenantRole::Operator).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!(error = %err, "failed to acquire connection for tenant discovery");
            return;
        }
    };

    let tenant_ids = match pulse_db::devices::distinct_tenant_ids(&mut conn).await {
        Ok(ids) => ids,
        Err(err) => {
            tracing::warn!(error = %err, "failed to list tenants");
            return;
        }
    };
    drop(conn);

    for tenant_id in tenant_ids {
        if let Err(err) = tick::run_tenant(context, &tenant_id).await {
            tracing::warn!(tenant_id, error = %err, "tenant evaluation pass failed");
        }
    }
}
