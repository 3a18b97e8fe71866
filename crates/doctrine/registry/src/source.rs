//! Canonical rule source and its content hash.

use crate::playbook::BundleFormat;
use crate::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// The live doctrine content every bundle hash is checked against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSourceSnapshot {
    /// Version stamped into regenerated bundles. Not part of the hash.
    pub version: String,
    #[serde(default)]
    pub base_doctrine: String,
    #[serde(default)]
    pub forbidden_global: Vec<String>,
    #[serde(default)]
    pub forbidden_by_channel: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub voice_constraints: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub weighting_tables: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub validation_patterns: Vec<String>,
    #[serde(default)]
    pub tier_scopes: BTreeMap<String, Vec<String>>,
}

fn sorted(items: &[String]) -> Vec<String> {
    let mut items = items.to_vec();
    items.sort();
    items
}

fn sorted_lists(map: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    map.iter().map(|(k, v)| (k.clone(), sorted(v))).collect()
}

impl RuleSourceSnapshot {
    /// BLAKE3 over the canonical encoding, as lowercase hex.
    ///
    /// Encoding: for each section in the fixed order below, the bytes
    /// `<section>=<compact JSON>\n`. Maps are emitted with sorted keys and
    /// every string list is sorted first, so the result does not depend on
    /// the order content was authored in.
    ///
    /// Sections: `base_doctrine`, `forbidden_global`,
    /// `forbidden_by_channel`, `voice_constraints`, `weighting_tables`,
    /// `validation_patterns`, `tier_scopes`.
    pub fn canonical_hash(&self) -> RegistryResult<String> {
        let sections: [(&str, serde_json::Result<String>); 7] = [
            ("base_doctrine", serde_json::to_string(&self.base_doctrine)),
            (
                "forbidden_global",
                serde_json::to_string(&sorted(&self.forbidden_global)),
            ),
            (
                "forbidden_by_channel",
                serde_json::to_string(&sorted_lists(&self.forbidden_by_channel)),
            ),
            (
                "voice_constraints",
                serde_json::to_string(&sorted_lists(&self.voice_constraints)),
            ),
            (
                "weighting_tables",
                serde_json::to_string(&self.weighting_tables),
            ),
            (
                "validation_patterns",
                serde_json::to_string(&sorted(&self.validation_patterns)),
            ),
            (
                "tier_scopes",
                serde_json::to_string(&sorted_lists(&self.tier_scopes)),
            ),
        ];

        let mut hasher = blake3::Hasher::new();
        for (name, encoded) in sections {
            let encoded = encoded.map_err(|e| RegistryError::Serialization(e.to_string()))?;
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(encoded.as_bytes());
            hasher.update(b"\n");
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Provider of the live canonical rule content.
pub trait CanonicalRuleSource: Send + Sync {
    fn snapshot(&self) -> RegistryResult<RuleSourceSnapshot>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Rule source held in memory; replaceable at runtime.
pub struct StaticRuleSource {
    snapshot: RwLock<RuleSourceSnapshot>,
}

impl StaticRuleSource {
    pub fn new(snapshot: RuleSourceSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn replace(&self, snapshot: RuleSourceSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl CanonicalRuleSource for StaticRuleSource {
    fn snapshot(&self) -> RegistryResult<RuleSourceSnapshot> {
        self.snapshot
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| RegistryError::RuleSource("snapshot lock poisoned".to_string()))
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Rule source read from a JSON or YAML file on every snapshot.
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CanonicalRuleSource for FileRuleSource {
    fn snapshot(&self) -> RegistryResult<RuleSourceSnapshot> {
        let format = BundleFormat::from_path(&self.path).ok_or_else(|| {
            RegistryError::RuleSource(format!(
                "unsupported rule source format: {}",
                self.path.display()
            ))
        })?;
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| RegistryError::RuleSource(format!("{}: {e}", self.path.display())))?;
        let parsed = match format {
            BundleFormat::Json => serde_json::from_str(&raw).map_err(|e| e.to_string()),
            BundleFormat::Yaml => serde_yaml::from_str(&raw).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| RegistryError::RuleSource(format!("{}: {e}", self.path.display())))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
