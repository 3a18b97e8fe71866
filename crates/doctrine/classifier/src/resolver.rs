//! Classification to enforcement mode mapping.

use doctrine_types::{ConstraintSet, Domain, DomainClassification, EnforcementMode};

/// Pure, total mapping from a classification to a mode and constraint set.
pub struct ModeResolver;

impl ModeResolver {
    pub fn resolve(classification: &DomainClassification) -> (EnforcementMode, ConstraintSet) {
        let mode = Self::mode_for(classification.domain);
        (mode, mode.constraints())
    }

    /// Anything not explicitly hybrid or reflective is strict.
    pub fn mode_for(domain: Domain) -> EnforcementMode {
        match domain {
            Domain::Hybrid | Domain::Process => EnforcementMode::Hybrid,
            Domain::Reflective => EnforcementMode::Reflective,
            Domain::Doctrine
            | Domain::RiskManagement
            | Domain::Execution
            | Domain::MarketStructure
            | Domain::General
            | Domain::Unknown => EnforcementMode::Strict,
        }
    }
}
