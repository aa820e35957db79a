//! Drives `pulse_notify::dispatch::Dispatcher` the way the delivery
//! worker pool does: build it once, then dispatch by `ChannelType`
//! against a handful of channel configs. No Postgres involved — jobs
//! are constructed in memory and channel backends are `MockChannel`
//! (MQTT) or a `wiremock` server (HTTP channels).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pulse_mqtt::{Channel as MqttChannel, MockChannel};
use pulse_notify::dispatch::Dispatcher;
use pulse_notify::senders::classify_http_status;
use pulse_protocol::channel::{AlertPayload, ChannelType, SendOutcome, TriggerEvent};
use pulse_protocol::channel::backoff_duration_secs;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_payload() -> AlertPayload {
    AlertPayload {
        alert_id: Uuid::new_v4(),
        tenant_id: "acme".into(),
        device_id: "dev-1".into(),
        severity: 5,
        alert_type: "temp_high".into(),
        summary: "temperature above threshold".into(),
        details: serde_json::json!({"value": 51.2}),
        triggered_at: Utc::now(),
        site_id: Some("hq".into()),
        _test: None,
    }
}

fn dispatcher(mqtt: Arc<dyn MqttChannel>) -> Dispatcher {
    Dispatcher::new(
        reqwest::Client::new(),
        mqtt,
        false,
        "1.3.6.1.4.1.9999.1",
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn slack_delivery_succeeds_against_a_mocked_incoming_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/services/hook")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let dispatcher = dispatcher(Arc::new(MockChannel::new()));
    let config = serde_json::json!({"webhook_url": format!("{}/services/hook", server.uri())});

    let outcome = dispatcher.dispatch(ChannelType::Slack, &sample_payload(), &config, TriggerEvent::Open).await;
    assert_eq!(outcome, SendOutcome::Ok);
}

#[tokio::test]
async fn slack_delivery_classifies_a_server_error_as_transient_and_a_client_error_as_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/flaky")).respond_with(ResponseTemplate::new(503)).mount(&server).await;
    Mock::given(method("POST")).and(path("/bad-secret")).respond_with(ResponseTemplate::new(401)).mount(&server).await;

    let dispatcher = dispatcher(Arc::new(MockChannel::new()));

    let transient = dispatcher
        .dispatch(
            ChannelType::Slack,
            &sample_payload(),
            &serde_json::json!({"webhook_url": format!("{}/flaky", server.uri())}),
            TriggerEvent::Open,
        )
        .await;
    assert!(transient.is_transient());

    let permanent = dispatcher
        .dispatch(
            ChannelType::Slack,
            &sample_payload(),
            &serde_json::json!({"webhook_url": format!("{}/bad-secret", server.uri())}),
            TriggerEvent::Open,
        )
        .await;
    assert!(!permanent.is_ok() && !permanent.is_transient());
}

#[tokio::test]
async fn generic_webhook_sender_refuses_a_loopback_target_even_when_it_answers() {
    // The generic webhook sender runs the SSRF url-safety check the
    // Slack/Teams senders skip (`spec.md` §4.5, §8 scenario 6). A
    // wiremock server bound to 127.0.0.1 is exactly the shape that check
    // exists to block, so dispatch must refuse it rather than deliver.
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let dispatcher = dispatcher(Arc::new(MockChannel::new()));
    let config = serde_json::json!({"url": server.uri()});

    let outcome = dispatcher.dispatch(ChannelType::Webhook, &sample_payload(), &config, TriggerEvent::Open).await;
    assert!(!outcome.is_ok(), "loopback webhook targets must never be delivered to");
}

#[tokio::test]
async fn mqtt_delivery_publishes_the_alert_envelope_to_the_fleet_topic() {
    let mock = Arc::new(MockChannel::new());
    let dispatcher = dispatcher(mock.clone());

    let outcome = dispatcher.dispatch(ChannelType::Mqtt, &sample_payload(), &serde_json::json!({}), TriggerEvent::Close).await;
    assert_eq!(outcome, SendOutcome::Ok);

    let published = mock.last_published().expect("mqtt sender should have published once");
    assert!(published.topic.contains("acme/dev-1/5/temp_high"));
}

#[test]
fn retry_backoff_grows_with_attempt_count_and_is_capped() {
    let early = backoff_duration_secs(1, 0.0);
    let later = backoff_duration_secs(4, 0.0);
    let far_out = backoff_duration_secs(20, 0.0);

    assert!(later > early, "backoff must grow across retries");
    assert!(far_out <= 600.0 * 1.25, "backoff must respect its cap even with positive jitter");
}

#[test]
fn a_webhook_job_that_exhausts_its_attempt_budget_is_dead_lettered_not_retried() {
    // Mirrors the decision `worker::process_job` makes on a transient
    // outcome: retry until `attempt_count + 1 >= max_attempts`, then
    // dead-letter instead of scheduling another retry.
    const MAX_ATTEMPTS: u32 = 5;
    let outcome = classify_http_status(503);
    assert!(outcome.is_transient());

    let mut attempt_count = 0u32;
    let mut dead_lettered = false;
    while attempt_count < MAX_ATTEMPTS {
        if attempt_count + 1 >= MAX_ATTEMPTS {
            dead_lettered = true;
            break;
        }
        attempt_count += 1;
    }

    assert!(dead_lettered);
    assert_eq!(attempt_count, MAX_ATTEMPTS - 1);
}
