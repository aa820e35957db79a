//! Ingest service configuration, loaded from environment.
//!
//! Follows the teacher's `ApiConfig::from_env` idiom: explicit
//! `default_*()` functions per field, no config-file crate.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_rate_limit_capacity")]
    pub rate_limit_capacity: u32,
    #[serde(default = "default_rate_limit_refill_per_sec")]
    pub rate_limit_refill_per_sec: f64,
    #[serde(default = "default_rate_limit_idle_ttl_secs")]
    pub rate_limit_idle_ttl_secs: u64,
    #[serde(default = "default_auth_cache_positive_ttl_secs")]
    pub auth_cache_positive_ttl_secs: u64,
    #[serde(default = "default_auth_cache_negative_ttl_secs")]
    pub auth_cache_negative_ttl_secs: u64,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_overflow_dir")]
    pub overflow_dir: String,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

fn default_batch_interval_ms() -> u64 {
    500
}
fn default_batch_size() -> usize {
    500
}
fn default_rate_limit_capacity() -> u32 {
    60
}
fn default_rate_limit_refill_per_sec() -> f64 {
    1.0
}
fn default_rate_limit_idle_ttl_secs() -> u64 {
    600
}
fn default_auth_cache_positive_ttl_secs() -> u64 {
    300
}
fn default_auth_cache_negative_ttl_secs() -> u64 {
    30
}
fn default_max_payload_bytes() -> usize {
    64 * 1024
}
fn default_overflow_dir() -> String {
    "/var/lib/pulse/ingest-overflow".to_string()
}
fn default_health_port() -> u16 {
    8080
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Self {
            batch_interval_ms: env_u64("BATCH_INTERVAL_MS", default_batch_interval_ms()),
            batch_size: env_u64("BATCH_SIZE", default_batch_size() as u64) as usize,
            rate_limit_capacity: env_u64("RATE_LIMIT_CAPACITY", default_rate_limit_capacity() as u64) as u32,
            rate_limit_refill_per_sec: std::env::var("RATE_LIMIT_REFILL_PER_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_refill_per_sec),
            rate_limit_idle_ttl_secs: env_u64("RATE_LIMIT_IDLE_TTL_SECS", default_rate_limit_idle_ttl_secs()),
            auth_cache_positive_ttl_secs: env_u64(
                "AUTH_CACHE_POSITIVE_TTL_SECS",
                default_auth_cache_positive_ttl_secs(),
            ),
            auth_cache_negative_ttl_secs: env_u64(
                "AUTH_CACHE_NEGATIVE_TTL_SECS",
                default_auth_cache_negative_ttl_secs(),
            ),
            max_payload_bytes: env_u64("MAX_PAYLOAD_BYTES", default_max_payload_bytes() as u64) as usize,
            overflow_dir: std::env::var("INGEST_OVERFLOW_DIR").unwrap_or_else(|_| default_overflow_dir()),
            health_port: env_u64("HEALTH_PORT", default_health_port() as u64) as u16,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = IngestConfig {
            batch_interval_ms: default_batch_interval_ms(),
            batch_size: default_batch_size(),
            rate_limit_capacity: default_rate_limit_capacity(),
            rate_limit_refill_per_sec: default_rate_limit_refill_per_sec(),
            rate_limit_idle_ttl_secs: default_rate_limit_idle_ttl_secs(),
            auth_cache_positive_ttl_secs: default_auth_cache_positive_ttl_secs(),
            auth_cache_negative_ttl_secs: default_auth_cache_negative_ttl_secs(),
            max_payload_bytes: default_max_payload_bytes(),
            overflow_dir: default_overflow_dir(),
            health_port: default_health_port(),
        };
        assert_eq!(config.batch_interval_ms, 500);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.rate_limit_capacity, 60);
        assert_eq!(config.max_payload_bytes, 65536);
    }
}
