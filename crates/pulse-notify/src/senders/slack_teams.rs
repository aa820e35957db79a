//! Slack and Teams incoming-webhook senders.
//!
//! Same outbound envelope as the generic webhook sender (`spec.md` §6),
//! but the target URL is a vendor-issued incoming-webhook URL configured
//! by the tenant at channel-creation time through the vendor's own UI,
//! not an arbitrary attacker-reachable endpoint — so unlike
//! [`crate::senders::webhook::WebhookSender`] this sender does not run
//! the SSRF URL-safety check.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use pulse_protocol::channel::{AlertPayload, SendOutcome};

use crate::senders::{Sender, classify_http_status};

#[derive(Debug, Deserialize)]
struct IncomingWebhookConfig {
    webhook_url: String,
}

pub struct SlackSender {
    client: Client,
}

impl SlackSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Sender for SlackSender {
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome {
        post_envelope(&self.client, config, payload).await
    }
}

pub struct TeamsSender {
    client: Client,
}

impl TeamsSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Sender for TeamsSender {
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome {
        post_envelope(&self.client, config, payload).await
    }
}

async fn post_envelope(client: &Client, config: &serde_json::Value, payload: &AlertPayload) -> SendOutcome {
    let config: IncomingWebhookConfig = match serde_json::from_value(config.clone()) {
        Ok(config) => config,
        Err(err) => return SendOutcome::Permanent(format!("invalid channel config: {err}")),
    };

    match client.post(&config.webhook_url).json(payload).send().await {
        Ok(response) => classify_http_status(response.status().as_u16()),
        Err(err) => SendOutcome::Transient(err.to_string()),
    }
}
