//! Per-device token bucket, keyed by `(tenant_id, device_id)`.
//!
//! Capacity `B` and refill rate `R`/sec are configured fleet-wide
//! (`spec.md` §4.2); idle buckets are evicted after
//! `rate_limit_idle_ttl_secs` so a long-lived ingest process doesn't
//! accumulate one bucket per device forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::IngestConfig;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_used: Instant,
}

impl Bucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_used: now,
        }
    }

    fn refill(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_refill = now;
    }
}

/// Token-bucket rate limiter. A field of `IngestContext`, not a
/// process-global singleton.
pub struct RateLimiter {
    buckets: Mutex<HashMap<(String, String), Bucket>>,
    capacity: f64,
    refill_per_sec: f64,
    idle_ttl: Duration,
}

impl RateLimiter {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity: config.rate_limit_capacity as f64,
            refill_per_sec: config.rate_limit_refill_per_sec,
            idle_ttl: Duration::from_secs(config.rate_limit_idle_ttl_secs),
        }
    }

    /// Attempt to consume one token for `(tenant_id, device_id)`. Returns
    /// `true` if the message is admitted, `false` if it should be dropped.
    pub fn try_consume(&self, tenant_id: &str, device_id: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        let key = (tenant_id.to_string(), device_id.to_string());
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| Bucket::new(self.capacity, now));

        bucket.refill(self.capacity, self.refill_per_sec, now);
        bucket.last_used = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets untouched for longer than the idle TTL. Called
    /// periodically from the batch-flush tick, not on its own timer.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_used) < self.idle_ttl);
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: u32, refill: f64) -> IngestConfig {
        IngestConfig {
            batch_interval_ms: 500,
            batch_size: 500,
            rate_limit_capacity: capacity,
            rate_limit_refill_per_sec: refill,
            rate_limit_idle_ttl_secs: 1,
            auth_cache_positive_ttl_secs: 300,
            auth_cache_negative_ttl_secs: 30,
            max_payload_bytes: 65536,
            overflow_dir: "/tmp".into(),
            health_port: 8080,
        }
    }

    #[test]
    fn admits_up_to_capacity_then_drops() {
        let limiter = RateLimiter::new(&config(3, 0.0));
        assert!(limiter.try_consume("acme", "dev-1"));
        assert!(limiter.try_consume("acme", "dev-1"));
        assert!(limiter.try_consume("acme", "dev-1"));
        assert!(!limiter.try_consume("acme", "dev-1"));
    }

    #[test]
    fn buckets_are_independent_per_device() {
        let limiter = RateLimiter::new(&config(1, 0.0));
        assert!(limiter.try_consume("acme", "dev-1"));
        assert!(limiter.try_consume("acme", "dev-2"));
        assert!(!limiter.try_consume("acme", "dev-1"));
    }

    #[test]
    fn refills_over_time() {
        let limiter = RateLimiter::new(&config(1, 1000.0));
        assert!(limiter.try_consume("acme", "dev-1"));
        assert!(!limiter.try_consume("acme", "dev-1"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(limiter.try_consume("acme", "dev-1"));
    }

    #[test]
    fn evict_idle_removes_stale_buckets() {
        let limiter = RateLimiter::new(&config(1, 0.0));
        limiter.try_consume("acme", "dev-1");
        assert_eq!(limiter.bucket_count(), 1);
        std::thread::sleep(Duration::from_millis(1100));
        limiter.evict_idle();
        assert_eq!(limiter.bucket_count(), 0);
    }
}
