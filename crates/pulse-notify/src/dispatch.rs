//! Channel-type dispatch: the one place that knows which `Sender` serves
//! which `ChannelType` (`spec.md` §9: "the delivery worker is agnostic of
//! channel specifics"). Built once at boot and shared (cheaply cloneable)
//! across every worker and the synchronous test-delivery path.

use std::sync::Arc;
use std::time::Duration;

use pulse_mqtt::Channel as MqttChannel;
use pulse_protocol::channel::{AlertPayload, ChannelType, SendOutcome, TriggerEvent};
use reqwest::Client;

use crate::senders::email::EmailSender;
use crate::senders::mqtt::MqttSender;
use crate::senders::pagerduty::PagerDutySender;
use crate::senders::slack_teams::{SlackSender, TeamsSender};
use crate::senders::snmp::SnmpSender;
use crate::senders::webhook::WebhookSender;
use crate::senders::Sender;

#[derive(Clone)]
pub struct Dispatcher {
    slack: Arc<SlackSender>,
    teams: Arc<TeamsSender>,
    webhook: Arc<WebhookSender>,
    pagerduty: Arc<PagerDutySender>,
    email: Arc<EmailSender>,
    snmp: Arc<SnmpSender>,
    mqtt: Arc<MqttSender>,
}

impl Dispatcher {
    pub fn new(
        http_client: Client,
        mqtt_channel: Arc<dyn MqttChannel>,
        allow_http_webhooks: bool,
        snmp_oid_prefix: &str,
        worker_timeout: Duration,
        smtp_timeout: Duration,
    ) -> Self {
        Self {
            slack: Arc::new(SlackSender::new(http_client.clone())),
            teams: Arc::new(TeamsSender::new(http_client.clone())),
            webhook: Arc::new(WebhookSender::new(http_client.clone(), allow_http_webhooks)),
            pagerduty: Arc::new(PagerDutySender::new(http_client)),
            email: Arc::new(EmailSender::new(smtp_timeout)),
            snmp: Arc::new(SnmpSender::new(snmp_oid_prefix, worker_timeout)),
            mqtt: Arc::new(MqttSender::new(mqtt_channel, worker_timeout)),
        }
    }

    /// Send `payload` over the channel type `channel_type`, with
    /// `trigger_event` consulted only by senders whose wire protocol
    /// encodes it directly (PagerDuty's `event_action`).
    pub async fn dispatch(
        &self,
        channel_type: ChannelType,
        payload: &AlertPayload,
        config: &serde_json::Value,
        trigger_event: TriggerEvent,
    ) -> SendOutcome {
        match channel_type {
            ChannelType::Slack => self.slack.send(payload, config).await,
            ChannelType::Teams => self.teams.send(payload, config).await,
            ChannelType::Webhook => self.webhook.send(payload, config).await,
            ChannelType::Pagerduty => self.pagerduty.send_with_trigger(payload, config, trigger_event).await,
            ChannelType::Email => self.email.send(payload, config).await,
            ChannelType::Snmp => self.snmp.send(payload, config).await,
            ChannelType::Mqtt => self.mqtt.send(payload, config).await,
        }
    }
}
