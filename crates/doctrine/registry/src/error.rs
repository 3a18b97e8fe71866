use doctrine_types::Domain;
use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Bundle is missing or carries an invalid provenance field.
    #[error("provenance error in {file}: {field} {reason}")]
    Provenance {
        file: String,
        field: &'static str,
        reason: String,
    },

    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    /// Admitted bundles disagree with the canonical source.
    #[error("bundle hash mismatch: {}", .0.join(", "))]
    Consistency(Vec<String>),

    #[error("no bundle loaded for domain {0}")]
    UnknownBundle(Domain),

    #[error("canonical rule source unavailable: {0}")]
    RuleSource(String),

    #[error("no bundle directory has been loaded")]
    NotLoaded,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
