//! Polymorphic channel senders (`spec.md` §9: "each channel is a small
//! interface `send(payload) -> (ok, transient?, error)`"). The delivery
//! worker is agnostic of channel specifics — it dispatches on
//! `ChannelType` to the matching `Sender` and interprets only the
//! returned `SendOutcome`.

pub mod email;
pub mod mqtt;
pub mod pagerduty;
pub mod slack_teams;
pub mod snmp;
pub mod webhook;

use async_trait::async_trait;

use pulse_protocol::channel::{AlertPayload, SendOutcome};

/// One outbound channel implementation. `config` is the channel's
/// type-specific JSONB blob from `notification_channel.config`.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome;
}

/// Classify an HTTP status per the Slack/Teams/Webhook/PagerDuty table in
/// `spec.md` §4.5: 2xx succeeds, 5xx/408/425/429 is transient, any other
/// 4xx is permanent.
pub fn classify_http_status(status: u16) -> SendOutcome {
    if (200..300).contains(&status) {
        SendOutcome::Ok
    } else if status >= 500 || matches!(status, 408 | 425 | 429) {
        SendOutcome::Transient(format!("http {status}"))
    } else {
        SendOutcome::Permanent(format!("http {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_status_buckets() {
        assert_eq!(classify_http_status(200), SendOutcome::Ok);
        assert_eq!(classify_http_status(204), SendOutcome::Ok);
        assert!(classify_http_status(503).is_transient());
        assert!(classify_http_status(429).is_transient());
        assert!(classify_http_status(408).is_transient());
        assert!(!classify_http_status(404).is_transient());
        assert!(!classify_http_status(404).is_ok());
    }
}
