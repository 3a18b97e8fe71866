//! Rule bundle model and on-disk format.

use crate::{RegistryError, RegistryResult};
use chrono::{DateTime, Utc};
use doctrine_types::Domain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The only `source_tag` a bundle may carry to be admitted.
pub const CANONICAL_SOURCE_TAG: &str = "canonical_doctrine";

/// One term/definition pair as written in a bundle file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub definition: String,
}

/// A bundle file as found on disk, before provenance checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybookFile {
    pub domain: Option<String>,
    pub version: Option<String>,
    pub source_tag: Option<String>,
    pub source_version: Option<String>,
    pub content_hash: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub terminology: Vec<TermEntry>,
    #[serde(default)]
    pub definitions: BTreeMap<String, String>,
    #[serde(default)]
    pub structural_rules: Vec<String>,
    #[serde(default)]
    pub mechanisms: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub failure_modes: Vec<String>,
    #[serde(default)]
    pub non_capabilities: Vec<String>,
}

/// Serialisation format of a bundle file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    Json,
    Yaml,
}

impl BundleFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(BundleFormat::Json),
            Some("yaml") | Some("yml") => Some(BundleFormat::Yaml),
            _ => None,
        }
    }
}

impl PlaybookFile {
    pub fn read(path: &Path, format: BundleFormat) -> RegistryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed = match format {
            BundleFormat::Json => serde_json::from_str(&raw).map_err(|e| e.to_string()),
            BundleFormat::Yaml => serde_yaml::from_str(&raw).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| RegistryError::Parse {
            file: path.display().to_string(),
            reason,
        })
    }

    pub fn write(&self, path: &Path, format: BundleFormat) -> RegistryResult<()> {
        let rendered = match format {
            BundleFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| RegistryError::Serialization(e.to_string()))?,
            BundleFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| RegistryError::Serialization(e.to_string()))?,
        };
        std::fs::write(path, rendered)?;
        Ok(())
    }

    /// Check provenance and convert into an admitted [`Playbook`].
    pub fn admit(self, file: &str) -> RegistryResult<Playbook> {
        let missing = |field: &'static str| RegistryError::Provenance {
            file: file.to_string(),
            field,
            reason: "is missing or empty".to_string(),
        };
        let required = |value: Option<String>, field: &'static str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| missing(field))
        };

        let domain_name = required(self.domain, "domain")?;
        let domain = Domain::parse(&domain_name);
        if domain == Domain::Unknown {
            return Err(RegistryError::Provenance {
                file: file.to_string(),
                field: "domain",
                reason: format!("names unknown domain {domain_name:?}"),
            });
        }
        let version = required(self.version, "version")?;
        let source_tag = required(self.source_tag, "source_tag")?;
        if source_tag != CANONICAL_SOURCE_TAG {
            return Err(RegistryError::Provenance {
                file: file.to_string(),
                field: "source_tag",
                reason: format!("is {source_tag:?}, expected {CANONICAL_SOURCE_TAG:?}"),
            });
        }
        let source_version = required(self.source_version, "source_version")?;
        let content_hash = required(self.content_hash, "content_hash")?;
        let generated_at = self.generated_at.ok_or_else(|| missing("generated_at"))?;

        Ok(Playbook {
            domain,
            version,
            source_tag,
            source_version,
            content_hash,
            generated_at,
            terminology: self
                .terminology
                .into_iter()
                .map(|t| (t.term, t.definition))
                .collect(),
            definitions: self.definitions,
            structural_rules: self.structural_rules,
            mechanisms: self.mechanisms,
            constraints: self.constraints,
            failure_modes: self.failure_modes,
            non_capabilities: self.non_capabilities,
        })
    }
}

/// An admitted, immutable rule bundle for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub domain: Domain,
    pub version: String,
    pub source_tag: String,
    pub source_version: String,
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
    pub terminology: BTreeMap<String, String>,
    pub definitions: BTreeMap<String, String>,
    pub structural_rules: Vec<String>,
    pub mechanisms: Vec<String>,
    pub constraints: Vec<String>,
    pub failure_modes: Vec<String>,
    pub non_capabilities: Vec<String>,
}

impl Playbook {
    /// Bundle identifier used in logs.
    pub fn identifier(&self) -> String {
        format!("{}@{}", self.domain, self.version)
    }

    /// Deterministic plain-text rendering for downstream injection.
    pub fn render(&self) -> String {
        let mut out = format!(
            "[{} v{} | source {}]\n",
            self.domain.ruleset_id(),
            self.version,
            self.source_version
        );
        let pairs = |out: &mut String, title: &str, map: &BTreeMap<String, String>| {
            if map.is_empty() {
                return;
            }
            out.push_str(title);
            out.push('\n');
            for (k, v) in map {
                out.push_str(&format!("- {k}: {v}\n"));
            }
        };
        let list = |out: &mut String, title: &str, items: &[String]| {
            if items.is_empty() {
                return;
            }
            out.push_str(title);
            out.push('\n');
            for item in items {
                out.push_str(&format!("- {item}\n"));
            }
        };
        pairs(&mut out, "TERMINOLOGY", &self.terminology);
        pairs(&mut out, "DEFINITIONS", &self.definitions);
        list(&mut out, "STRUCTURAL RULES", &self.structural_rules);
        list(&mut out, "MECHANISMS", &self.mechanisms);
        list(&mut out, "CONSTRAINTS", &self.constraints);
        list(&mut out, "FAILURE MODES", &self.failure_modes);
        list(&mut out, "NON-CAPABILITIES", &self.non_capabilities);
        out
    }
}
