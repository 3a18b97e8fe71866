use doctrine_types::ThresholdError;
use thiserror::Error;

/// Admin orchestration errors.
#[derive(Debug, Error)]
pub enum AosError {
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(#[from] ThresholdError),

    #[error("invalid user id: {0:?}")]
    InvalidUser(String),
}

pub type AosResult<T> = Result<T, AosError>;
