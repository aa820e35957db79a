//! Telemetry/health batch writer.
//!
//! Aggregates rows per flush interval `T` or `N` rows, whichever comes
//! first (`spec.md` §4.2). Each flush is one transaction via the
//! `insert_telemetry_batch`/`insert_device_health_batch` procedures,
//! retried whole up to three times; a batch that still fails is spilled
//! to a disk-backed overflow file so ingest keeps running.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use pulse_db::{Gateway, TenantRole};
use pulse_protocol::telemetry::{PlatformHealthRow, TelemetryRow};

const MAX_BATCH_RETRIES: u32 = 3;

/// Buffers telemetry and health rows across every tenant until a flush
/// is due. A single buffer serves the whole process — batches are
/// grouped by tenant at flush time since the gateway's scoped connection
/// is per-tenant.
pub struct Batcher {
    telemetry: Mutex<Vec<TelemetryRow>>,
    health: Mutex<Vec<PlatformHealthRow>>,
    batch_size: usize,
    overflow_dir: PathBuf,
}

impl Batcher {
    pub fn new(batch_size: usize, overflow_dir: impl Into<PathBuf>) -> Self {
        Self {
            telemetry: Mutex::new(Vec::new()),
            health: Mutex::new(Vec::new()),
            batch_size,
            overflow_dir: overflow_dir.into(),
        }
    }

    /// Push one validated telemetry row, returning whether the buffer has
    /// now reached `batch_size` and an immediate flush should be triggered.
    pub fn push_telemetry(&self, row: TelemetryRow) -> bool {
        let mut buf = self.telemetry.lock().unwrap();
        buf.push(row);
        buf.len() >= self.batch_size
    }

    pub fn push_health(&self, row: PlatformHealthRow) {
        self.health.lock().unwrap().push(row);
    }

    #[cfg(test)]
    pub fn pending_telemetry_count(&self) -> usize {
        self.telemetry.lock().unwrap().len()
    }

    /// Drain the buffers and write each tenant's rows in its own
    /// transaction. Called from the flush tick (interval-driven) or
    /// immediately when a push crosses `batch_size`.
    pub async fn flush(&self, gateway: &Gateway) {
        let telemetry = std::mem::take(&mut *self.telemetry.lock().unwrap());
        let health = std::mem::take(&mut *self.health.lock().unwrap());

        if telemetry.is_empty() && health.is_empty() {
            return;
        }

        for (tenant_id, rows) in group_by_tenant(telemetry, |r| r.tenant_id.clone()) {
            self.flush_telemetry_group(gateway, &tenant_id, rows).await;
        }
        for (tenant_id, rows) in group_by_tenant(health, |r| r.tenant_id.clone()) {
            self.flush_health_group(gateway, &tenant_id, rows).await;
        }
    }

    async fn flush_telemetry_group(&self, gateway: &Gateway, tenant_id: &str, rows: Vec<TelemetryRow>) {
        for attempt in 1..=MAX_BATCH_RETRIES {
            match self.try_write_telemetry(gateway, tenant_id, &rows).await {
                Ok(inserted) => {
                    tracing::debug!(tenant_id, inserted, rows = rows.len(), "telemetry batch flushed");
                    return;
                }
                Err(err) => {
                    tracing::warn!(tenant_id, attempt, error = %err, "telemetry batch write failed, retrying");
                }
            }
        }

        tracing::error!(tenant_id, rows = rows.len(), "telemetry batch exhausted retries, spilling to overflow");
        self.spill("telemetry", tenant_id, &rows);
    }

    async fn flush_health_group(&self, gateway: &Gateway, tenant_id: &str, rows: Vec<PlatformHealthRow>) {
        for attempt in 1..=MAX_BATCH_RETRIES {
            match self.try_write_health(gateway, tenant_id, &rows).await {
                Ok(inserted) => {
                    tracing::debug!(tenant_id, inserted, rows = rows.len(), "health batch flushed");
                    return;
                }
                Err(err) => {
                    tracing::warn!(tenant_id, attempt, error = %err, "health batch write failed, retrying");
                }
            }
        }

        tracing::error!(tenant_id, rows = rows.len(), "health batch exhausted retries, spilling to overflow");
        self.spill("health", tenant_id, &rows);
    }

    async fn try_write_telemetry(
        &self,
        gateway: &Gateway,
        tenant_id: &str,
        rows: &[TelemetryRow],
    ) -> pulse_db::GatewayResult<i32> {
        let mut conn = gateway.acquire_scoped(tenant_id, TenantRole::IotService).await?;
        let inserted = pulse_db::telemetry::insert_batch(&mut conn, rows).await?;
        pulse_db::telemetry::notify_ingested(&mut conn).await?;
        Ok(inserted)
    }

    async fn try_write_health(
        &self,
        gateway: &Gateway,
        tenant_id: &str,
        rows: &[PlatformHealthRow],
    ) -> pulse_db::GatewayResult<i32> {
        let mut conn = gateway.acquire_scoped(tenant_id, TenantRole::IotService).await?;
        pulse_db::health::insert_batch(&mut conn, rows).await
    }

    /// Append a failed batch, newline-delimited JSON, to a per-tenant
    /// overflow file under `overflow_dir`. Best-effort: a failure here is
    /// logged but never propagated, matching quarantine-write semantics.
    fn spill<T: serde::Serialize>(&self, kind: &str, tenant_id: &str, rows: &[T]) {
        if let Err(err) = std::fs::create_dir_all(&self.overflow_dir) {
            tracing::error!(error = %err, "failed to create overflow dir");
            return;
        }
        let path = self.overflow_dir.join(format!("{kind}-{tenant_id}.ndjson"));
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path);
        let mut file = match file {
            Ok(f) => f,
            Err(err) => {
                tracing::error!(error = %err, path = %path.display(), "failed to open overflow file");
                return;
            }
        };

        for row in rows {
            if let Ok(line) = serde_json::to_string(row) {
                let _ = writeln!(file, "{line}");
            }
        }
    }
}

fn group_by_tenant<T, F>(rows: Vec<T>, key: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> String,
{
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for row in rows {
        let tenant_id = key(&row);
        match groups.iter_mut().find(|(t, _)| *t == tenant_id) {
            Some((_, bucket)) => bucket.push(row),
            None => groups.push((tenant_id, vec![row])),
        }
    }
    groups
}

/// Duration helper so the flush tick's interval reads naturally at the
/// call site (`Duration::from_millis(config.batch_interval_ms)`).
pub fn flush_interval(batch_interval_ms: u64) -> Duration {
    Duration::from_millis(batch_interval_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_protocol::telemetry::MsgType;
    use std::collections::BTreeMap;

    fn sample_row(tenant_id: &str) -> TelemetryRow {
        TelemetryRow {
            time: Utc::now(),
            tenant_id: tenant_id.to_string(),
            device_id: "dev-1".into(),
            site_id: None,
            msg_type: MsgType::Telemetry,
            seq: None,
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn push_reports_when_batch_size_reached() {
        let batcher = Batcher::new(2, "/tmp/pulse-ingest-test-overflow");
        assert!(!batcher.push_telemetry(sample_row("acme")));
        assert!(batcher.push_telemetry(sample_row("acme")));
    }

    #[test]
    fn groups_rows_by_tenant() {
        let rows = vec![sample_row("acme"), sample_row("other"), sample_row("acme")];
        let groups = group_by_tenant(rows, |r| r.tenant_id.clone());
        assert_eq!(groups.len(), 2);
        let acme = groups.iter().find(|(t, _)| t == "acme").unwrap();
        assert_eq!(acme.1.len(), 2);
    }

    #[test]
    fn spill_writes_ndjson_lines() {
        let dir = std::env::temp_dir().join(format!("pulse-ingest-overflow-test-{}", uuid::Uuid::new_v4()));
        let batcher = Batcher::new(500, &dir);
        let rows = vec![sample_row("acme")];
        batcher.spill("telemetry", "acme", &rows);

        let path = dir.join("telemetry-acme.ndjson");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
