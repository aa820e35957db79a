//! Notify error taxonomy, per `spec.md` §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),

    /// Test-delivery rate limit exceeded (`spec.md` §4.5: 5/tenant/minute).
    #[error("test-delivery rate limit exceeded")]
    RateLimited,

    /// Channel not found for the tenant, or channel disabled.
    #[error("channel not found or disabled")]
    ChannelUnavailable,

    #[error(transparent)]
    Db(#[from] pulse_db::GatewayError),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
