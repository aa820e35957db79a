//! Two independent security boundaries exercised together because both
//! gate traffic before it reaches anything stateful: device CONNECT
//! authentication (ingest) and outbound webhook SSRF protection
//! (notify). Neither needs a live backend to prove correct.

use pulse_ingest::auth::hash_token;
use pulse_protocol::device::{Device, DeviceStatus};
use std::net::{IpAddr, Ipv4Addr};

use pulse_notify::url_safety::{is_unsafe_address, validate_url_shape, UrlSafetyError};

fn sample_device(status: DeviceStatus) -> Device {
    Device {
        tenant_id: "acme".into(),
        device_id: "dev-1".into(),
        serial: None,
        mac_address: None,
        model: None,
        firmware_version: None,
        template_id: None,
        tier: "standard".into(),
        sensor_limit: None,
        provision_token_hash: hash_token("provision-token-abc123"),
        status,
        created_at: chrono::Utc::now(),
    }
}

#[test]
fn a_suspended_or_expired_device_is_refused_regardless_of_a_valid_token() {
    assert!(sample_device(DeviceStatus::Active).is_connectable());
    assert!(!sample_device(DeviceStatus::Suspended).is_connectable());
    assert!(!sample_device(DeviceStatus::Expired).is_connectable());
}

#[test]
fn provision_token_hashing_never_stores_the_raw_secret() {
    let hashed = hash_token("provision-token-abc123");
    assert_ne!(hashed, "provision-token-abc123");
    assert_eq!(hashed, hash_token("provision-token-abc123"));
}

#[test]
fn a_webhook_channel_cannot_be_pointed_at_the_cloud_metadata_address() {
    assert!(is_unsafe_address(IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254))));
}

#[test]
fn a_webhook_channel_must_use_https_unless_the_operator_opts_into_http() {
    let rejected = validate_url_shape("http://attacker.example/hook", false);
    assert_eq!(rejected, Err(UrlSafetyError::DisallowedScheme("http".to_string())));

    let opted_in = validate_url_shape("http://internal-dev.example/hook", true);
    assert!(opted_in.is_ok());
}
