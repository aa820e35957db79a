//! Alert rule definitions, fingerprinting, and alert lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison operator used by threshold and multi-condition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
}

impl ComparisonOp {
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOp::Gt => value > threshold,
            ComparisonOp::Lt => value < threshold,
            ComparisonOp::Gte => value >= threshold,
            ComparisonOp::Lte => value <= threshold,
            ComparisonOp::Eq => value == threshold,
            ComparisonOp::Ne => value != threshold,
        }
    }
}

/// Whether all or any sub-conditions of a multi-condition rule must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    All,
    Any,
}

/// A single sub-condition inside a multi-condition rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCondition {
    pub metric: String,
    pub op: ComparisonOp,
    pub threshold: f64,
    pub duration_minutes: u32,
}

/// Aggregate function for window-aggregation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

/// Kind-specific condition payload. Tagged so a rule row's `condition`
/// JSONB column deserializes straight into the right variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    Threshold {
        metric: String,
        op: ComparisonOp,
        threshold: f64,
        duration_minutes: u32,
    },
    MultiCondition {
        conditions: Vec<SubCondition>,
        match_mode: MatchMode,
    },
    /// See `SPEC_FULL.md` §9(a) for the window-semantics decision: this is
    /// sample-count-within-wall-clock-ceiling, not a strict time window.
    Anomaly {
        metric: String,
        window_minutes: u32,
        min_samples: u32,
        z_threshold: f64,
    },
    TelemetryGap {
        gap_seconds: u32,
    },
    Window {
        metric: String,
        window_seconds: u32,
        aggregate: AggregateFn,
        op: ComparisonOp,
        threshold: f64,
    },
}

/// Tenant-owned alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub severity: u8,
    pub enabled: bool,
    pub site_ids: Vec<String>,
    pub group_ids: Vec<String>,
    pub device_group_id: Option<Uuid>,
    pub metric_name: Option<String>,
    pub sensor_id: Option<Uuid>,
    pub sensor_type: Option<String>,
    pub condition: RuleCondition,
}

impl AlertRule {
    /// A rule with empty scopes is unscoped (applies to every device); a
    /// rule with a non-empty scope applies only if the device is a member.
    pub fn in_scope(&self, device_group_ids: &[String]) -> bool {
        if self.group_ids.is_empty() {
            return true;
        }
        self.group_ids.iter().any(|g| device_group_ids.contains(g))
    }
}

/// Alert lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Closed,
}

/// A `fleet_alert` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub tenant_id: String,
    pub fingerprint: String,
    pub rule_id: Option<Uuid>,
    pub device_id: String,
    pub alert_type: String,
    pub severity: u8,
    pub status: AlertStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub details: serde_json::Value,
}

/// Build the fingerprint for a rule-sourced alert: `RULE:{rule_id}:{device_id}`.
pub fn rule_fingerprint(rule_id: Uuid, device_id: &str) -> String {
    format!("RULE:{rule_id}:{device_id}")
}

/// Build the fingerprint for a telemetry-gap alert: `NO_TELEMETRY:{device_id}`.
pub fn gap_fingerprint(device_id: &str) -> String {
    format!("NO_TELEMETRY:{device_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_ops() {
        assert!(ComparisonOp::Gt.evaluate(45.0, 40.0));
        assert!(ComparisonOp::Gte.evaluate(40.0, 40.0));
        assert!(!ComparisonOp::Gt.evaluate(40.0, 40.0));
        assert!(ComparisonOp::Ne.evaluate(1.0, 2.0));
    }

    #[test]
    fn fingerprints_are_stable() {
        let id = Uuid::nil();
        assert_eq!(rule_fingerprint(id, "dev-1"), format!("RULE:{id}:dev-1"));
        assert_eq!(gap_fingerprint("dev-1"), "NO_TELEMETRY:dev-1");
    }

    #[test]
    fn empty_group_ids_means_unscoped() {
        let rule = sample_rule(vec![]);
        assert!(rule.in_scope(&["group-x".into()]));
        assert!(rule.in_scope(&[]));
    }

    #[test]
    fn non_empty_group_ids_requires_membership() {
        let rule = sample_rule(vec!["group-a".into()]);
        assert!(rule.in_scope(&["group-a".into(), "group-b".into()]));
        assert!(!rule.in_scope(&["group-b".into()]));
        assert!(!rule.in_scope(&[]));
    }

    fn sample_rule(group_ids: Vec<String>) -> AlertRule {
        AlertRule {
            id: Uuid::nil(),
            tenant_id: "acme".into(),
            name: "high temp".into(),
            severity: 4,
            enabled: true,
            site_ids: vec![],
            group_ids,
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
}
