//! Explicit application context for the notify service.
//!
//! Same shape as `pulse_ingest::context::IngestContext` /
//! `pulse_evaluator::context::EvaluatorContext`: one struct built at boot
//! holding the gateway, config, the channel-send semaphore, and the
//! dispatcher, no process-global mutable state (`spec.md` §9).

use std::sync::Arc;

use tokio::sync::Semaphore;

use pulse_db::Gateway;

use crate::config::NotifyConfig;
use crate::dispatch::Dispatcher;

#[derive(Clone)]
pub struct NotifyContext {
    pub gateway: Gateway,
    pub config: Arc<NotifyConfig>,
    pub dispatcher: Dispatcher,
    /// Bounds the delivery worker pool's concurrent channel-sends
    /// (`spec.md` §5; `SPEC_FULL.md` §5 — the teacher's bounded-queue
    /// instinct made explicit with a `Semaphore`).
    pub send_permits: Arc<Semaphore>,
}

impl NotifyContext {
    pub fn new(gateway: Gateway, config: NotifyConfig, dispatcher: Dispatcher) -> Self {
        let permits = config.worker_count as usize;
        Self {
            gateway,
            config: Arc::new(config),
            dispatcher,
            send_permits: Arc::new(Semaphore::new(permits)),
        }
    }
}
