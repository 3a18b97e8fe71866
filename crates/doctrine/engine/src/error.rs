use doctrine_aos::AosError;
use doctrine_classifier::ClassifierError;
use doctrine_pde::PdeError;
use doctrine_registry::RegistryError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the governance engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Detection(#[from] PdeError),

    #[error(transparent)]
    Orchestration(#[from] AosError),

    #[error("unknown kill switch: {0}")]
    UnknownKillSwitch(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}
