use doctrine_types::Domain;
use thiserror::Error;

/// Result type for classifier administration.
pub type ClassifierResult<T> = Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("invalid pattern for {domain}: {pattern}: {reason}")]
    InvalidPattern {
        domain: Domain,
        pattern: String,
        reason: String,
    },

    #[error("domain {0} has no routing patterns")]
    UnroutableDomain(Domain),
}
