//! Explicit application context for the ingest service.
//!
//! `IngestContext` bundles the gateway, config, and every in-process
//! cache/limiter into one struct constructed at boot and passed through
//! — no process-global mutable singletons (`spec.md` §9).

use std::sync::Arc;

use pulse_db::Gateway;

use crate::auth::AuthCache;
use crate::config::IngestConfig;
use crate::rate_limit::RateLimiter;
use crate::validate::SeqTracker;

#[derive(Clone)]
pub struct IngestContext {
    pub gateway: Gateway,
    pub config: Arc<IngestConfig>,
    pub auth_cache: Arc<AuthCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub seq_tracker: Arc<SeqTracker>,
}

impl IngestContext {
    pub fn new(gateway: Gateway, config: IngestConfig) -> Self {
        let rate_limiter = RateLimiter::new(&config);
        Self {
            gateway,
            config: Arc::new(config),
            auth_cache: Arc::new(AuthCache::new()),
            rate_limiter: Arc::new(rate_limiter),
            seq_tracker: Arc::new(SeqTracker::new()),
        }
    }
}
