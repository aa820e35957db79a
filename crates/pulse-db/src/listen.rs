//! `LISTEN`/`NOTIFY` wiring for reactive wake-ups.
//!
//! Used by the evaluator (`telemetry_ingested`, `rules_changed`) and the
//! routing engine (`alerts_changed`). Listener errors are logged and the
//! listener re-subscribes after a backoff sleep rather than crashing the
//! process, matching the teacher's `mqtt_bridge::run` reconnect idiom.

use std::time::Duration;

use futures_util::StreamExt;
use sqlx::postgres::PgListener;

use crate::error::GatewayResult;

/// A channel notification, carrying whatever payload the emitting side
/// chose to send (usually a bare tenant id or nothing).
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    pub channel: String,
    pub payload: String,
}

/// Subscribe to one or more notification channels and hand each
/// notification to `on_notify`. Runs until cancelled; on a listener error,
/// logs and reconnects after `reconnect_backoff`.
pub async fn run_listener<F>(
    database_url: &str,
    channels: &[&str],
    reconnect_backoff: Duration,
    mut cancel: tokio::sync::watch::Receiver<bool>,
    mut on_notify: F,
) -> GatewayResult<()>
where
    F: FnMut(ChangeNotification),
{
    loop {
        if *cancel.borrow() {
            return Ok(());
        }

        let mut listener = match PgListener::connect(database_url).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::warn!(error = %err, "listener connect failed, retrying");
                tokio::time::sleep(reconnect_backoff).await;
                continue;
            }
        };

        if let Err(err) = listener.listen_all(channels.iter().copied()).await {
            tracing::warn!(error = %err, "listener subscribe failed, retrying");
            tokio::time::sleep(reconnect_backoff).await;
            continue;
        }

        let mut stream = listener.into_stream();
        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        return Ok(());
                    }
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(notification)) => {
                            on_notify(ChangeNotification {
                                channel: notification.channel().to_string(),
                                payload: notification.payload().to_string(),
                            });
                        }
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "listener stream error, reconnecting");
                            break;
                        }
                        None => {
                            tracing::warn!("listener stream ended, reconnecting");
                            break;
                        }
                    }
                }
            }
        }

        tokio::time::sleep(reconnect_backoff).await;
    }
}
