//! MQTT connection configuration for the service-account client ingest
//! and notify use to talk to the (external) broker — not per-device
//! mTLS, since devices authenticate via the CONNECT username/password
//! probe (`spec.md` §4.2), not client certificates.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname, from `MQTT_BROKER_URL`'s host component.
    pub broker_host: String,
    #[serde(default = "default_port")]
    pub broker_port: u16,
    /// Client ID for this process's broker connection.
    pub client_id: String,
    /// Enable server-verified TLS. When false, connects plaintext (local dev).
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    /// Optional path to a CA bundle; when absent, native root certs are used.
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Service-account username/password, if the broker requires one for
    /// the ingest/notify connection itself (distinct from per-device auth).
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_use_tls() -> bool {
    true
}

fn default_port() -> u16 {
    8883
}

fn default_keepalive() -> u16 {
    30
}

impl MqttConfig {
    pub fn from_env(client_id: &str) -> anyhow::Result<Self> {
        let url = std::env::var("MQTT_BROKER_URL").unwrap_or_else(|_| "mqtt://localhost:1883".into());
        let (host, port, use_tls) = parse_broker_url(&url)?;
        Ok(Self {
            broker_host: host,
            broker_port: port,
            client_id: client_id.to_string(),
            use_tls,
            ca_cert_path: std::env::var("MQTT_CA_CERT_PATH").ok(),
            keepalive_secs: default_keepalive(),
            username: std::env::var("MQTT_USERNAME").ok(),
            password: std::env::var("MQTT_PASSWORD").ok(),
        })
    }
}

/// Parse `mqtt://host:port` or `mqtts://host:port` into `(host, port, tls)`.
fn parse_broker_url(url: &str) -> anyhow::Result<(String, u16, bool)> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| anyhow::anyhow!("MQTT_BROKER_URL missing scheme: {url}"))?;
    let use_tls = match scheme {
        "mqtts" | "ssl" => true,
        "mqtt" | "tcp" => false,
        other => anyhow::bail!("unsupported MQTT scheme: {other}"),
    };
    let (host, port) = match rest.split_once(':') {
        Some((h, p)) => (h.to_string(), p.parse()?),
        None => (rest.to_string(), if use_tls { 8883 } else { 1883 }),
    };
    Ok((host, port, use_tls))
}
