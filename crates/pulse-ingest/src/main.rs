//! `pulse-ingestd` — MQTT device ingest binary.
//!
//! Wires the persistence gateway, MQTT subscriber, batch-flush tick, and
//! health/auth HTTP surface into one process: init tracing, load
//! config, construct state, spawn the concurrent loops, select on
//! `ctrl_c` for graceful shutdown.

mod auth;
mod batcher;
mod config;
mod context;
mod discovery;
mod error;
mod health;
mod mqtt_loop;
mod pipeline;
mod rate_limit;
mod validate;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use batcher::Batcher;
use config::IngestConfig;
use context::IngestContext;
use pulse_db::{DatabaseConfig, Gateway};
use pulse_mqtt::{MqttClient, MqttConfig};
use pulse_protocol::topics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pulse-ingestd starting");

    let ingest_config = IngestConfig::from_env();
    let db_config = DatabaseConfig::from_env();
    let mqtt_config = MqttConfig::from_env("pulse-ingestd")?;

    let gateway = Gateway::connect(&db_config).await?;
    let batcher = Arc::new(Batcher::new(ingest_config.batch_size, ingest_config.overflow_dir.clone()));
    let health_port = ingest_config.health_port;
    let flush_interval = batcher::flush_interval(ingest_config.batch_interval_ms);
    let context = IngestContext::new(gateway, ingest_config);

    let (mqtt_client, eventloop) = MqttClient::new(&mqtt_config)?;
    mqtt_client.subscribe_all(&topics::subscription_filters()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let subscriber_task = tokio::spawn(subscriber_loop(
        eventloop,
        context.clone(),
        batcher.clone(),
        shutdown_rx.clone(),
    ));
    let flush_task = tokio::spawn(flush_loop(
        context.clone(),
        batcher.clone(),
        flush_interval,
        shutdown_rx.clone(),
    ));

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
    let _ = subscriber_task.await;
    let _ = flush_task.await;

    batcher.flush(&context.gateway).await;
    tracing::info!("pulse-ingestd shut down cleanly");
    Ok(())
}

async fn subscriber_loop(
    eventloop: rumqttc::EventLoop,
    context: IngestContext,
    batcher: Arc<Batcher>,
    shutdown_rx: watch::Receiver<bool>,
) {
    mqtt_loop::run(eventloop, context, &batcher, shutdown_rx).await;
}

/// Periodic batch flush plus idle rate-limiter eviction, both driven off
/// the same tick (`spec.md` §4.2).
async fn flush_loop(context: IngestContext, batcher: Arc<Batcher>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }

            _ = ticker.tick() => {
                batcher.flush(&context.gateway).await;
                context.rate_limiter.evict_idle();
                let (hits, misses) = context.auth_cache.counters();
                tracing::debug!(hits, misses, "auth cache counters");
            }
        }
    }
}
