//! Evaluator error taxonomy, per `spec.md` §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("transient: {0}")]
    Transient(String),

    #[error(transparent)]
    Db(#[from] pulse_db::GatewayError),
}

pub type EvalResult<T> = Result<T, EvalError>;
