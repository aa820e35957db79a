//! Explicit application context for the evaluator service.
//!
//! Same shape as `pulse_ingest::context::IngestContext`: one struct built
//! at boot holding the gateway, config, and every in-process cache, no
//! process-global mutable state.

use std::sync::Arc;

use pulse_db::Gateway;

use crate::cache::{MappingCache, RuleCache};
use crate::config::EvalConfig;
use crate::tracker::ConditionTracker;

#[derive(Clone)]
pub struct EvaluatorContext {
    pub gateway: Gateway,
    pub config: Arc<EvalConfig>,
    pub rule_cache: Arc<RuleCache>,
    pub mapping_cache: Arc<MappingCache>,
    pub condition_tracker: Arc<ConditionTracker>,
}

impl EvaluatorContext {
    pub fn new(gateway: Gateway, config: EvalConfig) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
            rule_cache: Arc::new(RuleCache::new()),
            mapping_cache: Arc::new(MappingCache::new()),
            condition_tracker: Arc::new(ConditionTracker::new()),
        }
    }
}
