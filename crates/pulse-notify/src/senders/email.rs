//! SMTP email sender via `lettre`.
//!
//! Subject template `"[{severity_label}] {alert_type}: {device_id}"`
//! (`spec.md` §6); multipart HTML+text when the channel config's
//! `format` is `"html"`, plain text otherwise.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

use pulse_protocol::channel::{AlertPayload, SendOutcome};

use crate::senders::Sender;

#[derive(Debug, Deserialize)]
struct EmailConfig {
    smtp_host: String,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from: String,
    to: String,
    #[serde(default)]
    format: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

fn severity_label(severity: u8) -> &'static str {
    match severity {
        5 => "CRITICAL",
        4 => "ERROR",
        3 => "WARNING",
        2 => "NOTICE",
        _ => "INFO",
    }
}

pub struct EmailSender {
    timeout: std::time::Duration,
}

impl EmailSender {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self { timeout }
    }
}

impl Default for EmailSender {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(30))
    }
}

#[async_trait]
impl Sender for EmailSender {
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome {
        let config: EmailConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(err) => return SendOutcome::Permanent(format!("invalid email config: {err}")),
        };

        let from: Mailbox = match config.from.parse() {
            Ok(from) => from,
            Err(err) => return SendOutcome::Permanent(format!("invalid from address: {err}")),
        };
        let to: Mailbox = match config.to.parse() {
            Ok(to) => to,
            Err(err) => return SendOutcome::Permanent(format!("invalid to address: {err}")),
        };

        let subject = format!(
            "[{}] {}: {}",
            severity_label(payload.severity),
            payload.alert_type,
            payload.device_id
        );
        let text_body = format!(
            "{}\n\nSeverity: {}\nDevice: {}\nTriggered at: {}\nDetails: {}",
            payload.summary, payload.severity, payload.device_id, payload.triggered_at, payload.details
        );

        let builder = Message::builder().from(from).to(to).subject(subject);

        let message = if config.format.as_deref() == Some("html") {
            let html_body = format!("<p>{}</p><pre>{}</pre>", payload.summary, payload.details);
            builder.multipart(MultiPart::alternative(
                SinglePart::plain(text_body),
                SinglePart::html(html_body),
            ))
        } else {
            builder.body(text_body)
        };

        let message = match message {
            Ok(message) => message,
            Err(err) => return SendOutcome::Permanent(format!("malformed message: {err}")),
        };

        let mut transport_builder = match AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host) {
            Ok(builder) => builder.port(config.smtp_port).timeout(Some(self.timeout)),
            Err(err) => return SendOutcome::Permanent(format!("invalid smtp host: {err}")),
        };
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            transport_builder = transport_builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let transport = transport_builder.build();

        match transport.send(message).await {
            Ok(_) => SendOutcome::Ok,
            Err(err) if err.is_transient() => SendOutcome::Transient(err.to_string()),
            Err(err) => SendOutcome::Permanent(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_template() {
        assert_eq!(severity_label(5), "CRITICAL");
        assert_eq!(severity_label(1), "INFO");
    }
}
