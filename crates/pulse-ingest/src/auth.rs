//! Device CONNECT authentication: `username = "{tenant_id}:{device_id}"`,
//! `password = provision_token` (`spec.md` §4.2). Outcome is cached
//! in-process with a short positive TTL and a shorter negative TTL so a
//! reconnect storm doesn't hammer the persistence gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use pulse_db::{Gateway, TenantRole};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Allowed,
    Denied,
}

/// Stable, deterministic hash of a provision token, compared against
/// `device_registry.provision_token_hash`. SHA-256 is sufficient here:
/// tokens are high-entropy bearer secrets, not low-entropy passwords
/// needing a slow KDF.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

struct CacheEntry {
    outcome: AuthOutcome,
    expires_at: Instant,
}

/// In-process device-auth cache, a field of `IngestContext` — not a
/// process-global singleton (`spec.md` §9).
pub struct AuthCache {
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AuthCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn get(&self, tenant_id: &str, device_id: &str) -> Option<AuthOutcome> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(&(tenant_id.to_string(), device_id.to_string()))?;
        if entry.expires_at > Instant::now() {
            Some(entry.outcome)
        } else {
            None
        }
    }

    fn put(&self, tenant_id: &str, device_id: &str, outcome: AuthOutcome, ttl: Duration) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            (tenant_id.to_string(), device_id.to_string()),
            CacheEntry {
                outcome,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Snapshot of `(hits, misses)` for the periodic summary log
    /// (`SPEC_FULL.md` §12's observability supplement).
    pub fn counters(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

impl Default for AuthCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticate a device CONNECT probe, consulting the cache first and
/// the persistence gateway on a miss.
pub async fn authenticate(
    gateway: &Gateway,
    cache: &AuthCache,
    config: &IngestConfig,
    tenant_id: &str,
    device_id: &str,
    provision_token: &str,
) -> IngestResult<AuthOutcome> {
    if let Some(outcome) = cache.get(tenant_id, device_id) {
        cache.hits.fetch_add(1, Ordering::Relaxed);
        return Ok(outcome);
    }
    cache.misses.fetch_add(1, Ordering::Relaxed);

    let mut conn = gateway.acquire_scoped(tenant_id, TenantRole::IotService).await?;
    let device = pulse_db::devices::find_for_connect(&mut conn, tenant_id, device_id).await?;

    let outcome = match device {
        Some(device) if device.is_connectable() && device.provision_token_hash == hash_token(provision_token) => {
            AuthOutcome::Allowed
        }
        Some(device) => {
            tracing::warn!(
                tenant_id,
                device_id,
                status = ?device.status,
                "device connect rejected"
            );
            AuthOutcome::Denied
        }
        None => {
            tracing::warn!(tenant_id, device_id, "device connect rejected: unknown device");
            AuthOutcome::Denied
        }
    };

    let ttl = if outcome == AuthOutcome::Allowed {
        Duration::from_secs(config.auth_cache_positive_ttl_secs)
    } else {
        Duration::from_secs(config.auth_cache_negative_ttl_secs)
    };
    cache.put(tenant_id, device_id, outcome, ttl);

    match outcome {
        AuthOutcome::Allowed => Ok(outcome),
        AuthOutcome::Denied => Err(IngestError::Auth(format!("{tenant_id}/{device_id} not authorized"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_token_is_deterministic() {
        assert_eq!(hash_token("secret"), hash_token("secret"));
        assert_ne!(hash_token("secret"), hash_token("other"));
    }

    #[test]
    fn cache_roundtrip() {
        let cache = AuthCache::new();
        assert!(cache.get("acme", "dev-1").is_none());
        cache.put("acme", "dev-1", AuthOutcome::Allowed, Duration::from_secs(60));
        assert_eq!(cache.get("acme", "dev-1"), Some(AuthOutcome::Allowed));
    }

    #[test]
    fn cache_entry_expires() {
        let cache = AuthCache::new();
        cache.put("acme", "dev-1", AuthOutcome::Allowed, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("acme", "dev-1").is_none());
    }
}
