//! MQTT subscriber loop — drives the `rumqttc` event loop, classifies
//! incoming publishes, and runs each through the ingest pipeline.
//!
//! Reconnect-on-error idiom adapted from the teacher's
//! `mqtt_bridge::run`: a poll error is logged and retried after a short
//! sleep rather than treated as fatal, since `rumqttc` reconnects
//! transparently underneath.

use std::time::Duration;

use pulse_mqtt::{self, IncomingMessage};
use rumqttc::{Event, EventLoop, Packet};
use tokio::sync::watch;

use crate::batcher::Batcher;
use crate::context::IngestContext;
use crate::pipeline;

const RECONNECT_BACKOFF_SECS: u64 = 5;

/// Drive the event loop until `shutdown` fires. Every incoming publish is
/// classified and dispatched through [`pipeline::handle_message`].
pub async fn run(
    mut eventloop: EventLoop,
    context: IngestContext,
    batcher: &Batcher,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("mqtt subscriber loop started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("mqtt subscriber loop shutting down");
                    return;
                }
            }

            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = pulse_mqtt::classify(&publish);
                        pipeline::handle_message(&context, batcher, message).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(
                            error = %err,
                            "mqtt event loop error — reconnecting in {RECONNECT_BACKOFF_SECS}s"
                        );
                        tokio::time::sleep(Duration::from_secs(RECONNECT_BACKOFF_SECS)).await;
                    }
                }
            }
        }
    }
}

/// Classify one already-received message outside the event loop — the
/// seam the test harness drives directly without a broker.
pub async fn dispatch_one(context: &IngestContext, batcher: &Batcher, message: IncomingMessage) {
    pipeline::handle_message(context, batcher, message).await;
}
