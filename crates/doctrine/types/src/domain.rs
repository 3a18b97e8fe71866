//! Policy domains, enforcement modes and constraint presets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy domain a request is classified into.
///
/// Declaration order is the tie-break priority: earlier variants are more
/// restrictive and win equal-confidence ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Canonical doctrine definitions and primitives.
    Doctrine,
    /// Position sizing, stops, exposure.
    RiskManagement,
    /// Entries, exits and order handling.
    Execution,
    /// Market structure reading and regime identification.
    MarketStructure,
    /// Review of the user's own process and routines.
    Process,
    /// Mixed requests that combine doctrine with open discussion.
    Hybrid,
    /// Emotional or reflective conversations.
    Reflective,
    /// Nothing matched.
    General,
    /// Any domain this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Domain {
    /// Every classifiable domain in priority order.
    pub const PRIORITY: [Domain; 8] = [
        Domain::Doctrine,
        Domain::RiskManagement,
        Domain::Execution,
        Domain::MarketStructure,
        Domain::Process,
        Domain::Hybrid,
        Domain::Reflective,
        Domain::General,
    ];

    /// Position in the tie-break ordering (lower wins).
    pub fn priority_rank(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|d| d == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Doctrine => "doctrine",
            Domain::RiskManagement => "risk_management",
            Domain::Execution => "execution",
            Domain::MarketStructure => "market_structure",
            Domain::Process => "process",
            Domain::Hybrid => "hybrid",
            Domain::Reflective => "reflective",
            Domain::General => "general",
            Domain::Unknown => "unknown",
        }
    }

    /// Identifier of the rule set served for this domain.
    pub fn ruleset_id(&self) -> String {
        match self {
            Domain::Doctrine => "doctrine.core".to_string(),
            Domain::General | Domain::Unknown => "doctrine.default".to_string(),
            other => format!("doctrine.{}", other.as_str()),
        }
    }

    /// Parse a wire name. Unrecognised names map to [`Domain::Unknown`].
    pub fn parse(name: &str) -> Domain {
        Self::PRIORITY
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(Domain::Unknown)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a piece of text.
///
/// Advisory only: consumers that enforce policy re-derive it themselves when
/// the attached metadata is missing or untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainClassification {
    pub domain: Domain,
    pub confidence: f64,
    pub secondary_domain: Option<Domain>,
    pub matched_patterns: Vec<String>,
    pub mapped_ruleset_id: String,
}

impl DomainClassification {
    /// Classification used when nothing matched or the classifier is off.
    pub fn fallback() -> Self {
        Self {
            domain: Domain::General,
            confidence: 0.0,
            secondary_domain: None,
            matched_patterns: Vec::new(),
            mapped_ruleset_id: Domain::General.ruleset_id(),
        }
    }
}

/// Enforcement mode applied to a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    Strict,
    Hybrid,
    Reflective,
}

impl EnforcementMode {
    /// The immutable constraint preset for this mode.
    pub fn constraints(&self) -> ConstraintSet {
        match self {
            EnforcementMode::Strict => ConstraintSet::STRICT,
            EnforcementMode::Hybrid => ConstraintSet::HYBRID,
            EnforcementMode::Reflective => ConstraintSet::REFLECTIVE,
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementMode::Strict => write!(f, "strict"),
            EnforcementMode::Hybrid => write!(f, "hybrid"),
            EnforcementMode::Reflective => write!(f, "reflective"),
        }
    }
}

/// Constraints a downstream policy consumer must honour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub require_ruleset: bool,
    pub structured_format: bool,
    pub no_new_primitives: bool,
    pub no_speculation: bool,
    pub no_metaphor: bool,
    pub no_leak: bool,
    pub allow_lenses: bool,
    pub allow_overlay: bool,
}

impl ConstraintSet {
    pub const STRICT: ConstraintSet = ConstraintSet {
        require_ruleset: true,
        structured_format: true,
        no_new_primitives: true,
        no_speculation: true,
        no_metaphor: true,
        no_leak: true,
        allow_lenses: false,
        allow_overlay: false,
    };

    pub const HYBRID: ConstraintSet = ConstraintSet {
        require_ruleset: true,
        structured_format: true,
        no_new_primitives: true,
        no_speculation: true,
        no_metaphor: false,
        no_leak: true,
        allow_lenses: true,
        allow_overlay: true,
    };

    pub const REFLECTIVE: ConstraintSet = ConstraintSet {
        require_ruleset: false,
        structured_format: false,
        no_new_primitives: true,
        no_speculation: false,
        no_metaphor: false,
        no_leak: true,
        allow_lenses: true,
        allow_overlay: true,
    };
}
