//! Rule and metric-mapping caches, keyed by tenant.
//!
//! Same shape as `pulse_ingest::auth::AuthCache`: a plain struct guarded
//! by `std::sync::RwLock`, held only across the synchronous get/put, never
//! across an `.await` — a field of `EvaluatorContext`, not a process-global
//! singleton (`spec.md` §9). Invalidated wholesale on a `rules_changed`
//! notification rather than tracked per-tenant, since the notification
//! payload is the tenant id but a cold reload is cheap and simpler to
//! reason about than partial invalidation races.

use std::collections::HashMap;
use std::sync::RwLock;

use pulse_protocol::alert::AlertRule;
use pulse_protocol::mapping::MetricMapping;

#[derive(Default)]
pub struct RuleCache {
    by_tenant: RwLock<HashMap<String, Vec<AlertRule>>>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: &str) -> Option<Vec<AlertRule>> {
        self.by_tenant.read().unwrap().get(tenant_id).cloned()
    }

    pub fn put(&self, tenant_id: &str, rules: Vec<AlertRule>) {
        self.by_tenant.write().unwrap().insert(tenant_id.to_string(), rules);
    }

    pub fn invalidate(&self, tenant_id: &str) {
        self.by_tenant.write().unwrap().remove(tenant_id);
    }

    pub fn invalidate_all(&self) {
        self.by_tenant.write().unwrap().clear();
    }
}

#[derive(Default)]
pub struct MappingCache {
    by_tenant: RwLock<HashMap<String, Vec<MetricMapping>>>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: &str) -> Option<Vec<MetricMapping>> {
        self.by_tenant.read().unwrap().get(tenant_id).cloned()
    }

    pub fn put(&self, tenant_id: &str, mappings: Vec<MetricMapping>) {
        self.by_tenant.write().unwrap().insert(tenant_id.to_string(), mappings);
    }

    pub fn invalidate(&self, tenant_id: &str) {
        self.by_tenant.write().unwrap().remove(tenant_id);
    }

    pub fn invalidate_all(&self) {
        self.by_tenant.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_protocol::alert::{ComparisonOp, RuleCondition};
    use uuid::Uuid;

    fn sample_rule() -> AlertRule {
        AlertRule {
            id: Uuid::nil(),
            tenant_id: "acme".into(),
            name: "high temp".into(),
            severity: 4,
            enabled: true,
            site_ids: vec![],
            group_ids: vec![],
            device_group_id: None,
            metric_name: Some("temp_c".into()),
            sensor_id: None,
            sensor_type: None,
            condition: RuleCondition::Threshold {
                metric: "temp_c".into(),
                op: ComparisonOp::Gt,
                threshold: 40.0,
                duration_minutes: 0,
            },
        }
    }

    #[test]
    fn miss_then_put_then_hit() {
        let cache = RuleCache::new();
        assert!(cache.get("acme").is_none());
        cache.put("acme", vec![sample_rule()]);
        assert_eq!(cache.get("acme").unwrap().len(), 1);
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = RuleCache::new();
        cache.put("acme", vec![sample_rule()]);
        cache.invalidate("acme");
        assert!(cache.get("acme").is_none());
    }

    #[test]
    fn invalidate_all_clears_every_tenant() {
        let cache = RuleCache::new();
        cache.put("acme", vec![sample_rule()]);
        cache.put("globex", vec![sample_rule()]);
        cache.invalidate_all();
        assert!(cache.get("acme").is_none());
        assert!(cache.get("globex").is_none());
    }
}
