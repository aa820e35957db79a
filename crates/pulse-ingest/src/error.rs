//! Ingest error taxonomy, per `spec.md` §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("auth error: {0}")]
    Auth(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("rate limited")]
    RateLimited,

    #[error("transient: {0}")]
    Transient(String),

    #[error(transparent)]
    Db(#[from] pulse_db::GatewayError),
}

pub type IngestResult<T> = Result<T, IngestError>;
