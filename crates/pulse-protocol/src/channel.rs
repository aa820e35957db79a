//! Notification channel, routing rule, job, and dead-letter domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of external sink a notification channel delivers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Slack,
    Pagerduty,
    Teams,
    Webhook,
    Email,
    Snmp,
    Mqtt,
}

/// Tenant-owned notification channel. `config` is channel-type-specific
/// and is never returned to clients unredacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: Uuid,
    pub tenant_id: String,
    pub channel_type: ChannelType,
    pub config: serde_json::Value,
    pub enabled: bool,
}

/// Links alert filters to a single channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: Uuid,
    pub tenant_id: String,
    pub channel_id: Uuid,
    pub severity_floor: u8,
    pub alert_types: Vec<String>,
    pub tags: Vec<String>,
    pub enabled: bool,
}

impl RoutingRule {
    /// A rule matches when severity clears the floor, the alert type is in
    /// the type set (or the set is empty, meaning "any type"), and every
    /// configured tag is present on the alert.
    pub fn matches(&self, severity: u8, alert_type: &str, alert_tags: &[String]) -> bool {
        if !self.enabled {
            return false;
        }
        if severity < self.severity_floor {
            return false;
        }
        if !self.alert_types.is_empty() && !self.alert_types.iter().any(|t| t == alert_type) {
            return false;
        }
        self.tags.iter().all(|tag| alert_tags.contains(tag))
    }
}

/// The alert state transition that caused a job to be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerEvent {
    Open,
    Close,
    Ack,
}

/// Delivery job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    InFlight,
    Completed,
    Failed,
}

/// Work item enqueued for one `(alert, channel)` pair on an alert state
/// transition. Unique on `(tenant_id, alert_id, channel_id, trigger_event)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub id: Uuid,
    pub tenant_id: String,
    pub alert_id: Uuid,
    pub channel_id: Uuid,
    pub trigger_event: TriggerEvent,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub last_error: Option<String>,
    pub owner_token: Option<Uuid>,
}

/// Outcome of a single channel-send attempt, returned by every `Sender`.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Ok,
    Transient(String),
    Permanent(String),
}

impl SendOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SendOutcome::Ok)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SendOutcome::Transient(_))
    }
}

/// The outbound envelope every channel sender serializes, per
/// `spec.md` §6's `{alert_id, tenant_id, device_id, ...}` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub alert_id: Uuid,
    pub tenant_id: String,
    pub device_id: String,
    pub severity: u8,
    pub alert_type: String,
    pub summary: String,
    pub details: serde_json::Value,
    pub triggered_at: DateTime<Utc>,
    pub site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _test: Option<bool>,
}

/// Written when a job exhausts retries. Retains the original payload and
/// last error for human replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub job_id: Uuid,
    pub alert_id: Uuid,
    pub channel_id: Uuid,
    pub payload: serde_json::Value,
    pub last_error: String,
    pub created_at: DateTime<Utc>,
}

/// Exponential backoff with jitter for delivery retries:
/// `base=5s, factor=2, jitter=±25%, cap=10min`.
///
/// `jitter_unit` is a caller-supplied value in `[-1.0, 1.0]` (rather than
/// sampling randomness here) so the calculation stays a pure, testable
/// function; callers draw `jitter_unit` from their own RNG.
pub fn backoff_duration_secs(attempt: u32, jitter_unit: f64) -> f64 {
    const BASE: f64 = 5.0;
    const FACTOR: f64 = 2.0;
    const CAP: f64 = 600.0;
    const JITTER_PCT: f64 = 0.25;

    let raw = BASE * FACTOR.powi(attempt.saturating_sub(1) as i32);
    let capped = raw.min(CAP);
    let jitter = capped * JITTER_PCT * jitter_unit.clamp(-1.0, 1.0);
    (capped + jitter).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_rule_respects_severity_floor() {
        let rule = sample_rule(4, vec![], vec![]);
        assert!(!rule.matches(3, "temp_high", &[]));
        assert!(rule.matches(4, "temp_high", &[]));
        assert!(rule.matches(5, "temp_high", &[]));
    }

    #[test]
    fn routing_rule_empty_type_set_matches_any() {
        let rule = sample_rule(1, vec![], vec![]);
        assert!(rule.matches(5, "anything", &[]));
    }

    #[test]
    fn routing_rule_requires_listed_type() {
        let rule = sample_rule(1, vec!["temp_high".into()], vec![]);
        assert!(rule.matches(5, "temp_high", &[]));
        assert!(!rule.matches(5, "humidity_low", &[]));
    }

    #[test]
    fn routing_rule_requires_all_tags() {
        let rule = sample_rule(1, vec![], vec!["region:eu".into()]);
        assert!(rule.matches(5, "x", &["region:eu".into(), "env:prod".into()]));
        assert!(!rule.matches(5, "x", &["env:prod".into()]));
    }

    #[test]
    fn disabled_rule_never_matches() {
        let mut rule = sample_rule(1, vec![], vec![]);
        rule.enabled = false;
        assert!(!rule.matches(5, "anything", &[]));
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        assert_eq!(backoff_duration_secs(1, 0.0), 5.0);
        assert_eq!(backoff_duration_secs(2, 0.0), 10.0);
        assert_eq!(backoff_duration_secs(3, 0.0), 20.0);
        assert_eq!(backoff_duration_secs(20, 0.0), 600.0);
    }

    #[test]
    fn backoff_jitter_stays_within_twenty_five_percent() {
        let base = backoff_duration_secs(2, 0.0);
        let high = backoff_duration_secs(2, 1.0);
        let low = backoff_duration_secs(2, -1.0);
        assert!((high - base - base * 0.25).abs() < 1e-9);
        assert!((base - low - base * 0.25).abs() < 1e-9);
    }

    fn sample_rule(severity_floor: u8, alert_types: Vec<String>, tags: Vec<String>) -> RoutingRule {
        RoutingRule {
            id: Uuid::nil(),
            tenant_id: "acme".into(),
            channel_id: Uuid::nil(),
            severity_floor,
            alert_types,
            tags,
            enabled: true,
        }
    }
}
