//! Evaluator service configuration, loaded from environment.
//!
//! Follows the same `serde`-default/`from_env()` idiom as
//! `pulse_ingest::config::IngestConfig`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    /// Periodic tick interval (`spec.md` §4.3: default 5s).
    #[serde(default = "default_eval_interval_secs")]
    pub eval_interval_secs: u64,
    /// Heartbeat age below which a device is `ONLINE`.
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: i64,
    /// Heartbeat age below which a device is `STALE` rather than `OFFLINE`.
    #[serde(default = "default_offline_threshold_secs")]
    pub offline_threshold_secs: i64,
    /// Reconnect backoff for the `LISTEN` wake source on connection error.
    #[serde(default = "default_listener_backoff_secs")]
    pub listener_backoff_secs: u64,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

fn default_eval_interval_secs() -> u64 {
    5
}
fn default_stale_threshold_secs() -> i64 {
    60
}
fn default_offline_threshold_secs() -> i64 {
    300
}
fn default_listener_backoff_secs() -> u64 {
    5
}
fn default_health_port() -> u16 {
    8081
}

impl EvalConfig {
    pub fn from_env() -> Self {
        Self {
            eval_interval_secs: env_u64("EVAL_INTERVAL_SEC", default_eval_interval_secs()),
            stale_threshold_secs: env_i64("STALE_THRESHOLD_SEC", default_stale_threshold_secs()),
            offline_threshold_secs: env_i64("OFFLINE_THRESHOLD_SEC", default_offline_threshold_secs()),
            listener_backoff_secs: env_u64("EVAL_LISTENER_BACKOFF_SEC", default_listener_backoff_secs()),
            health_port: env_u64("HEALTH_PORT", default_health_port() as u64) as u16,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EvalConfig {
            eval_interval_secs: default_eval_interval_secs(),
            stale_threshold_secs: default_stale_threshold_secs(),
            offline_threshold_secs: default_offline_threshold_secs(),
            listener_backoff_secs: default_listener_backoff_secs(),
            health_port: default_health_port(),
        };
        assert_eq!(config.eval_interval_secs, 5);
        assert_eq!(config.stale_threshold_secs, 60);
        assert_eq!(config.offline_threshold_secs, 300);
    }
}
