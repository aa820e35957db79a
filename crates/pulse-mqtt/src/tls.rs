//! TLS configuration for the broker connection.
//!
//! Server-verified TLS only — ingest and notify connect as a service
//! account, not as a device, so there is no client certificate here.
//! Per-device authentication is the CONNECT username/password probe
//! handled in `pulse-ingest`'s auth module.

use rumqttc::Transport;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};

/// Build a TLS transport from a configured CA bundle. A managed broker
/// deployment (AWS IoT, HiveMQ Cloud, ...) always ships one; there is no
/// implicit native-root fallback.
pub fn load_tls_transport(config: &MqttConfig) -> MqttResult<Transport> {
    let path = config
        .ca_cert_path
        .as_ref()
        .ok_or_else(|| MqttError::Tls("use_tls is set but ca_cert_path is missing".into()))?;
    let ca = std::fs::read(path)
        .map_err(|e| MqttError::Tls(format!("failed to read CA cert '{path}': {e}")))?;

    Ok(Transport::tls_with_config(
        rumqttc::TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: None,
        },
    ))
}

/// Build MQTT options without TLS (for local testing / dev mode).
pub fn plaintext_transport() -> Transport {
    Transport::Tcp
}
