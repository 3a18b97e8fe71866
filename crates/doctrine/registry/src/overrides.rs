//! Administrative override layer on top of canonical bundle content.

use crate::Playbook;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One editable bundle field with its replacement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum BundleField {
    Terminology(BTreeMap<String, String>),
    Definitions(BTreeMap<String, String>),
    StructuralRules(Vec<String>),
    Constraints(Vec<String>),
    FailureModes(Vec<String>),
    NonCapabilities(Vec<String>),
}

impl BundleField {
    pub fn name(&self) -> &'static str {
        match self {
            BundleField::Terminology(_) => "terminology",
            BundleField::Definitions(_) => "definitions",
            BundleField::StructuralRules(_) => "structural_rules",
            BundleField::Constraints(_) => "constraints",
            BundleField::FailureModes(_) => "failure_modes",
            BundleField::NonCapabilities(_) => "non_capabilities",
        }
    }
}

/// Field replacements for one domain. Canonical files are never touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminology: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural_rules: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_modes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_capabilities: Option<Vec<String>>,
}

impl BundleOverride {
    pub fn set(&mut self, field: BundleField) {
        match field {
            BundleField::Terminology(v) => self.terminology = Some(v),
            BundleField::Definitions(v) => self.definitions = Some(v),
            BundleField::StructuralRules(v) => self.structural_rules = Some(v),
            BundleField::Constraints(v) => self.constraints = Some(v),
            BundleField::FailureModes(v) => self.failure_modes = Some(v),
            BundleField::NonCapabilities(v) => self.non_capabilities = Some(v),
        }
    }

    /// Names of overridden fields, in declaration order.
    pub fn fields(&self) -> Vec<&'static str> {
        [
            ("terminology", self.terminology.is_some()),
            ("definitions", self.definitions.is_some()),
            ("structural_rules", self.structural_rules.is_some()),
            ("constraints", self.constraints.is_some()),
            ("failure_modes", self.failure_modes.is_some()),
            ("non_capabilities", self.non_capabilities.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Effective bundle: canonical content with overridden fields replaced.
    pub fn apply(&self, playbook: &Playbook) -> Playbook {
        let mut out = playbook.clone();
        if let Some(v) = &self.terminology {
            out.terminology = v.clone();
        }
        if let Some(v) = &self.definitions {
            out.definitions = v.clone();
        }
        if let Some(v) = &self.structural_rules {
            out.structural_rules = v.clone();
        }
        if let Some(v) = &self.constraints {
            out.constraints = v.clone();
        }
        if let Some(v) = &self.failure_modes {
            out.failure_modes = v.clone();
        }
        if let Some(v) = &self.non_capabilities {
            out.non_capabilities = v.clone();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_wire_format() {
        let field: BundleField = serde_json::from_str(
            r#"{"field":"constraints","value":["no hindsight language"]}"#,
        )
        .unwrap();
        assert_eq!(
            field,
            BundleField::Constraints(vec!["no hindsight language".into()])
        );
        assert_eq!(field.name(), "constraints");
    }

    #[test]
    fn set_tracks_overridden_fields() {
        let mut o = BundleOverride::default();
        assert!(o.is_empty());
        o.set(BundleField::FailureModes(vec!["revenge entries".into()]));
        o.set(BundleField::Terminology(BTreeMap::new()));
        assert_eq!(o.fields(), vec!["terminology", "failure_modes"]);
    }
}
