//! PagerDuty Events API v2 sender.
//!
//! `event_action` is derived from the job's `trigger_event`: `OPEN` maps
//! to `trigger`, `CLOSE` to `resolve` (`spec.md` §6). `ACK` has no
//! direct Events API v2 equivalent in this deployment's scope, so it also
//! maps to `trigger` — acknowledgement isn't surfaced as a tenant action
//! anywhere in this system yet.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use pulse_protocol::channel::{AlertPayload, SendOutcome, TriggerEvent};

use crate::senders::{Sender, classify_http_status};

const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

#[derive(Debug, Deserialize)]
struct PagerDutyConfig {
    routing_key: String,
}

#[derive(Serialize)]
struct EventsV2Request<'a> {
    routing_key: &'a str,
    event_action: &'a str,
    dedup_key: String,
    payload: EventsV2Payload<'a>,
}

#[derive(Serialize)]
struct EventsV2Payload<'a> {
    summary: &'a str,
    source: &'a str,
    severity: &'a str,
    custom_details: &'a serde_json::Value,
}

fn severity_label(severity: u8) -> &'static str {
    match severity {
        5 => "critical",
        4 => "error",
        3 => "warning",
        _ => "info",
    }
}

pub struct PagerDutySender {
    client: Client,
}

impl PagerDutySender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn send_with_trigger(
        &self,
        payload: &AlertPayload,
        config: &serde_json::Value,
        trigger_event: TriggerEvent,
    ) -> SendOutcome {
        let config: PagerDutyConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(err) => return SendOutcome::Permanent(format!("invalid pagerduty config: {err}")),
        };

        let event_action = match trigger_event {
            TriggerEvent::Close => "resolve",
            TriggerEvent::Open | TriggerEvent::Ack => "trigger",
        };

        let request = EventsV2Request {
            routing_key: &config.routing_key,
            event_action,
            dedup_key: payload.alert_id.to_string(),
            payload: EventsV2Payload {
                summary: &payload.summary,
                source: &payload.device_id,
                severity: severity_label(payload.severity),
                custom_details: &payload.details,
            },
        };

        match self.client.post(EVENTS_API_URL).json(&json!(request)).send().await {
            Ok(response) => classify_http_status(response.status().as_u16()),
            Err(err) => SendOutcome::Transient(err.to_string()),
        }
    }
}

#[async_trait]
impl Sender for PagerDutySender {
    /// The plain `Sender::send` entrypoint always triggers; the delivery
    /// worker calls [`PagerDutySender::send_with_trigger`] directly so it
    /// can pass the job's actual `trigger_event`.
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome {
        self.send_with_trigger(payload, config, TriggerEvent::Open).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_labels() {
        assert_eq!(severity_label(5), "critical");
        assert_eq!(severity_label(4), "error");
        assert_eq!(severity_label(3), "warning");
        assert_eq!(severity_label(1), "info");
    }
}
