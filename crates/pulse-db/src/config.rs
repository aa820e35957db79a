//! Persistence gateway configuration.

use serde::Deserialize;

/// Pool and connection configuration, loaded from environment.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `DB_DSN`.
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Acquisition timeout; a 5s default maps the "backpressure" error
    /// per the persistence gateway's failure-mode contract.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DB_DSN").unwrap_or_default(),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_connections),
            acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_acquire_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gateway_contract() {
        let config = DatabaseConfig {
            database_url: "postgres://localhost/pulse".into(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        };
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 5);
    }
}
