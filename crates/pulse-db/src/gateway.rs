//! The persistence gateway: a pooled connection with a scoped tenant-context
//! operation primitive. All data access from the application goes through
//! [`Gateway::acquire_scoped`].

use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};

use crate::config::DatabaseConfig;
use crate::error::{GatewayError, GatewayResult};

const MIGRATIONS: &[&str] = &[
    include_str!("../migrations/001_devices.sql"),
    include_str!("../migrations/002_telemetry.sql"),
    include_str!("../migrations/003_rules_and_alerts.sql"),
    include_str!("../migrations/004_channels_and_jobs.sql"),
    include_str!("../migrations/005_mappings_and_maintenance.sql"),
];

/// The session role set alongside `app.tenant_id`; row-level policies
/// consult both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantRole {
    /// Ordinary tenant-scoped access — the default for ingest/evaluator/notify.
    Tenant,
    /// Bypasses the row-level policy for read-only fleet views.
    Operator,
    /// The identity ingest/evaluator/notify connect as internally.
    IotService,
}

impl TenantRole {
    fn as_str(self) -> &'static str {
        match self {
            TenantRole::Tenant => "tenant",
            TenantRole::Operator => "operator",
            TenantRole::IotService => "iot_service",
        }
    }
}

/// Pooled PostgreSQL access with a scoped tenant-context operation
/// primitive. Cheap to clone — wraps an `Arc`-backed `PgPool` internally.
#[derive(Clone)]
pub struct Gateway {
    pool: PgPool,
    acquire_timeout: Duration,
}

impl Gateway {
    /// Connect and run migrations, following the teacher's `raw_sql`
    /// bootstrap idiom.
    pub async fn connect(config: &DatabaseConfig) -> GatewayResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        tracing::info!("running database migrations");
        for migration in MIGRATIONS {
            sqlx::raw_sql(migration).execute(&pool).await?;
        }
        tracing::info!("migrations complete");

        Ok(Self {
            pool,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
        })
    }

    #[cfg(test)]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Acquire a connection and stamp the tenant/role session variables on
    /// it, for callers that want to issue several statements on the same
    /// connection (e.g. a batch insert followed by a notify).
    pub async fn acquire_scoped(
        &self,
        tenant_id: &str,
        role: TenantRole,
    ) -> GatewayResult<PoolConnection<Postgres>> {
        let mut conn = tokio::time::timeout(self.acquire_timeout, self.pool.acquire())
            .await
            .map_err(|_| {
                tracing::warn!(tenant_id, "connection pool acquire timed out");
                GatewayError::Backpressure
            })??;

        sqlx::query("SELECT set_config('app.tenant_id', $1, false), set_config('app.role', $2, false)")
            .bind(tenant_id)
            .bind(role.as_str())
            .execute(&mut *conn)
            .await?;

        tracing::debug!(tenant_id, role = role.as_str(), "acquired scoped connection");
        Ok(conn)
    }
}

/// Defensive check that a row returned by a tenant-scoped query actually
/// belongs to the tenant the caller requested — a correctness net on top
/// of the row-level policy, per `spec.md` §9.
pub fn assert_tenant_row(expected: &str, actual: &str) -> GatewayResult<()> {
    if expected != actual {
        return Err(GatewayError::RowLevelViolation {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_role_names() {
        assert_eq!(TenantRole::Tenant.as_str(), "tenant");
        assert_eq!(TenantRole::Operator.as_str(), "operator");
        assert_eq!(TenantRole::IotService.as_str(), "iot_service");
    }

    #[test]
    fn assert_tenant_row_matches() {
        assert!(assert_tenant_row("acme", "acme").is_ok());
        assert!(assert_tenant_row("acme", "other").is_err());
    }
}
