use thiserror::Error;

/// Result type for threshold validation.
pub type ThresholdResult<T> = Result<T, ThresholdError>;

/// Rejected governance threshold values.
#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("min_confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max} seconds")]
    TooLarge { field: &'static str, max: u64 },
}
