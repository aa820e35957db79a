//! Generic webhook sender: HTTPS POST of the alert JSON envelope, signed
//! with HMAC-SHA256 when the channel config carries a `secret`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use pulse_protocol::channel::{AlertPayload, SendOutcome};

use crate::hmac_sign;
use crate::senders::{Sender, classify_http_status};
use crate::url_safety;

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    url: String,
    secret: Option<String>,
}

pub struct WebhookSender {
    client: Client,
    allow_http: bool,
}

impl WebhookSender {
    pub fn new(client: Client, allow_http: bool) -> Self {
        Self { client, allow_http }
    }
}

#[async_trait]
impl Sender for WebhookSender {
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome {
        let config: WebhookConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(err) => return SendOutcome::Permanent(format!("invalid webhook config: {err}")),
        };

        let url = match url_safety::validate_url_shape(&config.url, self.allow_http) {
            Ok(url) => url,
            Err(err) => return SendOutcome::Permanent(err.to_string()),
        };

        if let Err(err) = url_safety::validate_resolves_safely(&url, self.allow_http).await {
            return SendOutcome::Permanent(err.to_string());
        }

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(err) => return SendOutcome::Permanent(format!("payload serialization failed: {err}")),
        };

        let mut request = self.client.post(url).header("content-type", "application/json").body(body.clone());
        if let Some(secret) = &config.secret {
            request = request.header(hmac_sign::SIGNATURE_HEADER, hmac_sign::sign(secret, &body));
        }

        match request.send().await {
            Ok(response) => classify_http_status(response.status().as_u16()),
            Err(err) if err.is_timeout() || err.is_connect() => SendOutcome::Transient(err.to_string()),
            Err(err) => SendOutcome::Transient(err.to_string()),
        }
    }
}
