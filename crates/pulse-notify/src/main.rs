//! `pulse-notifyd` — routing engine and delivery worker pool binary.
//!
//! Wires the persistence gateway, the routing engine's reactive/sweep
//! loop, the delivery worker pool, and the health HTTP surface into one
//! process, following the teacher's `main.rs` shape: init tracing, load
//! config, construct state, spawn the concurrent loops, select on
//! `ctrl_c` for graceful shutdown.

mod config;
mod context;
mod dispatch;
mod error;
mod health;
mod hmac_sign;
mod router;
mod senders;
mod test_delivery;
mod url_safety;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use config::NotifyConfig;
use context::NotifyContext;
use dispatch::Dispatcher;
use pulse_db::{DatabaseConfig, Gateway};
use pulse_mqtt::{Channel as MqttChannel, MqttClient, MqttConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pulse-notifyd starting");

    let notify_config = NotifyConfig::from_env();
    let db_config = DatabaseConfig::from_env();
    let mqtt_config = MqttConfig::from_env("pulse-notifyd")?;

    let gateway = Gateway::connect(&db_config).await?;

    let (mqtt_client, mqtt_eventloop) = MqttClient::new(&mqtt_config)?;
    let mqtt_client: Arc<dyn MqttChannel> = Arc::new(mqtt_client);

    let http_client = Client::builder()
        .timeout(Duration::from_secs(notify_config.worker_timeout_secs))
        .build()?;

    let dispatcher = Dispatcher::new(
        http_client,
        mqtt_client,
        notify_config.allow_http_webhooks,
        &notify_config.snmp_oid_prefix,
        Duration::from_secs(notify_config.worker_timeout_secs),
        Duration::from_secs(notify_config.smtp_timeout_secs),
    );

    let health_port = notify_config.health_port;
    let sweep_interval = Duration::from_secs(notify_config.sweep_interval_secs);
    let context = NotifyContext::new(gateway, notify_config, dispatcher);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mqtt_task = tokio::spawn(drive_mqtt_eventloop(mqtt_eventloop, shutdown_rx.clone()));
    let (listener_task, wake_rx) = spawn_routing_listener(context.clone(), db_config.database_url.clone(), shutdown_rx.clone());
    let routing_task = tokio::spawn(routing_loop(context.clone(), sweep_interval, wake_rx, shutdown_rx.clone()));
    let worker_tasks = worker::spawn_pool(context.clone(), shutdown_rx.clone());

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
    let _ = routing_task.await;
    let _ = listener_task.await;
    let _ = mqtt_task.await;
    for task in worker_tasks {
        let _ = task.await;
    }

    tracing::info!("pulse-notifyd shut down cleanly");
    Ok(())
}

/// Drive the notify service's own MQTT connection — used only to publish
/// alerts out to MQTT channels, never to subscribe. Reconnect-on-error
/// idiom matches `pulse_ingest::mqtt_loop::run`.
async fn drive_mqtt_eventloop(mut eventloop: rumqttc::EventLoop, mut shutdown_rx: watch::Receiver<bool>) {
    const RECONNECT_BACKOFF_SECS: u64 = 5;
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }

            event = eventloop.poll() => {
                if let Err(err) = event {
                    tracing::error!(error = %err, "notify mqtt event loop error, reconnecting");
                    tokio::time::sleep(Duration::from_secs(RECONNECT_BACKOFF_SECS)).await;
                }
            }
        }
    }
}

/// Spawn the `alerts_changed` listener; returns a receiver that changes
/// on every notification, nudging the routing loop to run a pass sooner
/// than the next safety sweep (`spec.md` §4.4).
fn spawn_routing_listener(
    ctx: NotifyContext,
    database_url: String,
    shutdown_rx: watch::Receiver<bool>,
) -> (tokio::task::JoinHandle<()>, watch::Receiver<u64>) {
    let (wake_tx, wake_rx) = watch::channel(0u64);

    let handle = tokio::spawn(async move {
        let backoff = Duration::from_secs(ctx.config.listener_backoff_secs);
        let result = pulse_db::listen::run_listener(&database_url, &["alerts_changed"], backoff, shutdown_rx, |_| {
            wake_tx.send_modify(|counter| *counter = counter.wrapping_add(1));
        })
        .await;

        if let Err(err) = result {
            tracing::error!(error = %err, "notify listener task exited");
        }
    });

    (handle, wake_rx)
}

/// Run a routing pass over every tenant, triggered by the 60-second
/// safety sweep or a reactive `alerts_changed` wake-up, whichever comes
/// first (`spec.md` §4.4).
async fn routing_loop(
    context: NotifyContext,
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

async fn run_all_tenants(context: &NotifyContext) {
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
        match router::run_tenant(&context, &tenant_id).await {
            Ok(enqueued) if enqueued > 0 => {
                tracing::debug!(tenant_id, enqueued, "routing pass enqueued jobs");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(tenant_id, error = %err, "routing pass failed");
            }
        }
    }
}
