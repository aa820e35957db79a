//! Notify service configuration, loaded from environment.
//!
//! Same `serde`-default/`from_env()` idiom as `pulse_ingest::config::IngestConfig`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Delivery worker pool size (`spec.md` §4.5: default 8).
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,
    /// Per-request delivery timeout (`spec.md` §5: default 10s).
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,
    /// SMTP send timeout (`spec.md` §5: default 30s).
    #[serde(default = "default_smtp_timeout_secs")]
    pub smtp_timeout_secs: u64,
    #[serde(default = "default_worker_max_attempts")]
    pub worker_max_attempts: u32,
    /// Routing engine safety-sweep interval (`spec.md` §4.4: 60s).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_listener_backoff_secs")]
    pub listener_backoff_secs: u64,
    /// Dev-only override permitting `http://` webhook URLs.
    #[serde(default)]
    pub allow_http_webhooks: bool,
    #[serde(default = "default_webhook_oid_prefix")]
    pub snmp_oid_prefix: String,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

fn default_worker_count() -> u32 {
    8
}
fn default_worker_timeout_secs() -> u64 {
    10
}
fn default_smtp_timeout_secs() -> u64 {
    30
}
fn default_worker_max_attempts() -> u32 {
    5
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_listener_backoff_secs() -> u64 {
    5
}
fn default_webhook_oid_prefix() -> String {
    "1.3.6.1.4.1.99999".to_string()
}
fn default_health_port() -> u16 {
    8082
}

impl NotifyConfig {
    pub fn from_env() -> Self {
        Self {
            worker_count: env_u32("WORKER_COUNT", default_worker_count()),
            worker_timeout_secs: env_u64("WORKER_TIMEOUT_SEC", default_worker_timeout_secs()),
            smtp_timeout_secs: env_u64("SMTP_TIMEOUT_SEC", default_smtp_timeout_secs()),
            worker_max_attempts: env_u32("WORKER_MAX_ATTEMPTS", default_worker_max_attempts()),
            sweep_interval_secs: env_u64("ROUTING_SWEEP_INTERVAL_SEC", default_sweep_interval_secs()),
            listener_backoff_secs: env_u64("NOTIFY_LISTENER_BACKOFF_SEC", default_listener_backoff_secs()),
            allow_http_webhooks: std::env::var("ALLOW_HTTP_WEBHOOKS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            snmp_oid_prefix: std::env::var("SNMP_OID_PREFIX").unwrap_or_else(|_| default_webhook_oid_prefix()),
            health_port: env_u64("HEALTH_PORT", default_health_port() as u64) as u16,
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = NotifyConfig {
            worker_count: default_worker_count(),
            worker_timeout_secs: default_worker_timeout_secs(),
            smtp_timeout_secs: default_smtp_timeout_secs(),
            worker_max_attempts: default_worker_max_attempts(),
            sweep_interval_secs: default_sweep_interval_secs(),
            listener_backoff_secs: default_listener_backoff_secs(),
            allow_http_webhooks: false,
            snmp_oid_prefix: default_webhook_oid_prefix(),
            health_port: default_health_port(),
        };
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.worker_max_attempts, 5);
        assert_eq!(config.sweep_interval_secs, 60);
        assert!(!config.allow_http_webhooks);
    }
}
