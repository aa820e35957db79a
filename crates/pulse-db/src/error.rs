//! Shared persistence-gateway error type.

use thiserror::Error;

/// Errors surfaced by every query module in this crate. Domain crates
/// (`pulse-ingest`, `pulse-evaluator`, `pulse-notify`) wrap this into their
/// own narrower error enums rather than matching on it directly.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Pool acquire timed out (5s, per the persistence gateway's budget).
    #[error("backpressure: could not acquire a connection in time")]
    Backpressure,

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    /// A query returned a row whose `tenant_id` didn't match the session
    /// variable just set — the row-level policy is the primary defense,
    /// this is the gateway's own correctness check on top of it.
    #[error("row-level violation: expected tenant {expected}, got {actual}")]
    RowLevelViolation { expected: String, actual: String },
}

pub type GatewayResult<T> = Result<T, GatewayError>;
