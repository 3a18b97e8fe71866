//! Playbook registry with global safe mode.

use crate::overrides::{BundleField, BundleOverride};
use crate::playbook::{BundleFormat, Playbook, PlaybookFile, CANONICAL_SOURCE_TAG};
use crate::source::CanonicalRuleSource;
use crate::terms::{self, TermWarning};
use crate::{RegistryError, RegistryResult};
use chrono::{DateTime, Utc};
use doctrine_store::BestEffortStore;
use doctrine_types::Domain;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{error, info, warn};

const OVERRIDE_PREFIX: &str = "doctrine:override:";

/// Immutable view of the registry after one load cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryState {
    pub bundles: BTreeMap<Domain, Playbook>,
    pub safe_mode: bool,
    /// Domains whose bundle hash disagreed with the canonical hash.
    pub mismatch_details: Vec<String>,
    /// Files rejected at load time, with the reason.
    pub rejected: Vec<String>,
    pub canonical_hash: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl RegistryState {
    pub fn is_synchronized(&self) -> bool {
        !self.safe_mode && !self.bundles.is_empty()
    }
}

/// Outcome of [`PlaybookRegistry::load_all`].
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub admitted: Vec<String>,
    pub rejected: Vec<String>,
    pub mismatches: Vec<String>,
    pub safe_mode: bool,
    pub canonical_hash: Option<String>,
}

/// Outcome of [`PlaybookRegistry::regenerate_all`].
#[derive(Debug, Clone, Serialize)]
pub struct RegenerateReport {
    pub regenerated: Vec<String>,
    pub skipped: Vec<String>,
    pub canonical_hash: String,
    pub load: LoadReport,
}

/// Comparison of one bundle against the live canonical source.
#[derive(Debug, Clone, Serialize)]
pub struct BundleDiff {
    pub domain: Domain,
    pub version: String,
    pub bundle_hash: String,
    pub canonical_hash: String,
    pub hash_matches: bool,
    pub bundle_source_version: String,
    pub canonical_source_version: String,
    pub overridden_fields: Vec<&'static str>,
}

/// Registry of admitted playbooks.
///
/// Readers clone the current `Arc<RegistryState>` and never wait on a load
/// beyond the pointer swap. Loads and regenerations serialise on
/// `load_lock`.
pub struct PlaybookRegistry {
    rule_source: Arc<dyn CanonicalRuleSource>,
    store: BestEffortStore,
    state: RwLock<Arc<RegistryState>>,
    overrides: RwLock<BTreeMap<Domain, BundleOverride>>,
    source_dir: RwLock<Option<PathBuf>>,
    load_lock: Mutex<()>,
}

impl PlaybookRegistry {
    pub fn new(rule_source: Arc<dyn CanonicalRuleSource>, store: BestEffortStore) -> Self {
        Self {
            rule_source,
            store,
            state: RwLock::new(Arc::new(RegistryState::default())),
            overrides: RwLock::new(BTreeMap::new()),
            source_dir: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<RegistryState> {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn swap_state(&self, next: RegistryState) {
        let next = Arc::new(next);
        match self.state.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn overrides_for(&self, domain: Domain) -> Option<BundleOverride> {
        let guard = match self.overrides.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(&domain).cloned()
    }

    pub fn is_safe_mode(&self) -> bool {
        self.state().safe_mode
    }

    pub fn is_synchronized(&self) -> bool {
        self.state().is_synchronized()
    }

    /// `Consistency` naming the mismatching domains while in safe mode.
    pub fn verify_consistency(&self) -> RegistryResult<()> {
        let state = self.state();
        if state.safe_mode {
            return Err(RegistryError::Consistency(state.mismatch_details.clone()));
        }
        Ok(())
    }

    /// Load every bundle file in `dir` and verify it against the canonical
    /// source. Replaces the previous state wholesale.
    pub fn load_all(&self, dir: &Path) -> RegistryResult<LoadReport> {
        let _guard = self.load_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.load_locked(dir)
    }

    fn load_locked(&self, dir: &Path) -> RegistryResult<LoadReport> {
        let files = bundle_files(dir)?;
        let mut bundles: BTreeMap<Domain, Playbook> = BTreeMap::new();
        let mut rejected = Vec::new();

        for (path, format) in files {
            let file = path.display().to_string();
            let admitted = PlaybookFile::read(&path, format).and_then(|raw| raw.admit(&file));
            match admitted {
                Ok(playbook) if bundles.contains_key(&playbook.domain) => {
                    warn!(file = %file, domain = %playbook.domain, "Duplicate bundle for domain, skipping");
                    rejected.push(format!("{file}: duplicate bundle for {}", playbook.domain));
                }
                Ok(playbook) => {
                    bundles.insert(playbook.domain, playbook);
                }
                Err(e) => {
                    warn!(file = %file, error = %e, "Rejected rule bundle");
                    rejected.push(e.to_string());
                }
            }
        }

        let canonical = self
            .rule_source
            .snapshot()
            .and_then(|snapshot| snapshot.canonical_hash());

        let (canonical_hash, mismatch_details) = match canonical {
            Ok(hash) => {
                let mismatches = bundles
                    .values()
                    .filter(|b| b.content_hash != hash)
                    .map(|b| b.domain.to_string())
                    .collect::<Vec<_>>();
                (Some(hash), mismatches)
            }
            Err(e) => {
                error!(
                    severity = "critical",
                    source = %self.rule_source.describe(),
                    error = %e,
                    "Canonical rule source unavailable, bundles cannot be verified"
                );
                (None, vec![format!("canonical source unavailable: {e}")])
            }
        };

        let safe_mode = !mismatch_details.is_empty();
        if safe_mode && canonical_hash.is_some() {
            let identifiers = bundles
                .values()
                .filter(|b| mismatch_details.contains(&b.domain.to_string()))
                .map(|b| b.identifier())
                .collect::<Vec<_>>();
            error!(
                severity = "critical",
                mismatches = ?identifiers,
                canonical_hash = ?canonical_hash,
                "Rule bundle hash mismatch, registry entering safe mode"
            );
        }

        let report = LoadReport {
            admitted: bundles.values().map(|b| b.identifier()).collect(),
            rejected: rejected.clone(),
            mismatches: mismatch_details.clone(),
            safe_mode,
            canonical_hash: canonical_hash.clone(),
        };

        info!(
            dir = %dir.display(),
            admitted = report.admitted.len(),
            rejected = report.rejected.len(),
            safe_mode,
            "Rule bundles loaded"
        );

        self.swap_state(RegistryState {
            bundles,
            safe_mode,
            mismatch_details,
            rejected,
            canonical_hash,
            loaded_at: Some(Utc::now()),
        });
        match self.source_dir.write() {
            Ok(mut guard) => *guard = Some(dir.to_path_buf()),
            Err(poisoned) => *poisoned.into_inner() = Some(dir.to_path_buf()),
        }
        Ok(report)
    }

    /// Reload from the directory used by the last load.
    pub fn reload(&self) -> RegistryResult<LoadReport> {
        let dir = self.loaded_dir()?;
        self.load_all(&dir)
    }

    fn loaded_dir(&self) -> RegistryResult<PathBuf> {
        let guard = match self.source_dir.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().ok_or(RegistryError::NotLoaded)
    }

    /// Re-stamp every parseable bundle file with the live canonical hash,
    /// write it back and reload. This is the only way out of safe mode.
    pub fn regenerate_all(&self) -> RegistryResult<RegenerateReport> {
        let dir = self.loaded_dir()?;
        let _guard = self.load_lock.lock().unwrap_or_else(|p| p.into_inner());

        let snapshot = self.rule_source.snapshot()?;
        let canonical_hash = snapshot.canonical_hash()?;
        let now = Utc::now();
        let mut regenerated = Vec::new();
        let mut skipped = Vec::new();

        for (path, format) in bundle_files(&dir)? {
            let mut raw = match PlaybookFile::read(&path, format) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unparseable bundle during regenerate");
                    skipped.push(e.to_string());
                    continue;
                }
            };
            if raw.domain.as_deref().map(Domain::parse).unwrap_or(Domain::Unknown)
                == Domain::Unknown
            {
                skipped.push(format!("{}: no valid domain", path.display()));
                continue;
            }
            if raw.version.as_deref().map_or(true, |v| v.trim().is_empty()) {
                raw.version = Some("1".to_string());
            }
            raw.source_tag = Some(CANONICAL_SOURCE_TAG.to_string());
            raw.source_version = Some(snapshot.version.clone());
            raw.content_hash = Some(canonical_hash.clone());
            raw.generated_at = Some(now);
            raw.write(&path, format)?;
            regenerated.push(path.display().to_string());
        }

        info!(
            regenerated = regenerated.len(),
            skipped = skipped.len(),
            canonical_hash = %canonical_hash,
            "Rule bundles regenerated from canonical source"
        );

        let load = self.load_locked(&dir)?;
        Ok(RegenerateReport {
            regenerated,
            skipped,
            canonical_hash,
            load,
        })
    }

    /// Rule content for `domain`; empty in safe mode or when no bundle exists.
    pub fn injection_text(&self, domain: Domain) -> String {
        let state = self.state();
        if state.safe_mode {
            return String::new();
        }
        match state.bundles.get(&domain) {
            Some(bundle) => self.effective(bundle).render(),
            None => String::new(),
        }
    }

    fn effective(&self, bundle: &Playbook) -> Playbook {
        match self.overrides_for(bundle.domain) {
            Some(o) => o.apply(bundle),
            None => bundle.clone(),
        }
    }

    /// Every canonical term across bundles. Empty in safe mode.
    pub fn all_terms(&self) -> BTreeMap<String, String> {
        let state = self.state();
        if state.safe_mode {
            return BTreeMap::new();
        }
        state
            .bundles
            .values()
            .flat_map(|b| self.effective(b).terminology)
            .collect()
    }

    /// Heuristic warnings for short-form use of multi-word canonical terms.
    pub fn validate_terms(&self, text: &str) -> Vec<TermWarning> {
        terms::validate(&self.all_terms(), text)
    }

    /// Effective bundles, overrides applied.
    pub fn list_bundles(&self) -> Vec<Playbook> {
        self.state()
            .bundles
            .values()
            .map(|b| self.effective(b))
            .collect()
    }

    pub fn get_bundle(&self, domain: Domain) -> Option<Playbook> {
        self.state().bundles.get(&domain).map(|b| self.effective(b))
    }

    /// Replace one field of a bundle through the override layer.
    pub async fn update_field(&self, domain: Domain, field: BundleField) -> RegistryResult<()> {
        if !self.state().bundles.contains_key(&domain) {
            return Err(RegistryError::UnknownBundle(domain));
        }
        let name = field.name();
        let updated = {
            let mut guard = match self.overrides.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let entry = guard.entry(domain).or_default();
            entry.set(field);
            entry.clone()
        };
        let encoded = serde_json::to_string(&updated)
            .map_err(|e| RegistryError::Serialization(e.to_string()))?;
        self.store
            .set(&format!("{OVERRIDE_PREFIX}{domain}"), encoded, None)
            .await;
        info!(domain = %domain, field = name, "Bundle override updated");
        Ok(())
    }

    /// Drop every override for `domain`.
    pub async fn clear_overrides(&self, domain: Domain) {
        let removed = match self.overrides.write() {
            Ok(mut guard) => guard.remove(&domain),
            Err(poisoned) => poisoned.into_inner().remove(&domain),
        };
        if removed.is_some() {
            self.store.delete(&format!("{OVERRIDE_PREFIX}{domain}")).await;
            info!(domain = %domain, "Bundle overrides cleared");
        }
    }

    /// Rebuild the override layer from the durable store.
    pub async fn hydrate_overrides(&self) -> usize {
        let mut restored = BTreeMap::new();
        for key in self.store.scan_prefix(OVERRIDE_PREFIX).await {
            let domain = Domain::parse(key.trim_start_matches(OVERRIDE_PREFIX));
            if domain == Domain::Unknown {
                continue;
            }
            let Some(raw) = self.store.get(&key).await else {
                continue;
            };
            match serde_json::from_str::<BundleOverride>(&raw) {
                Ok(o) if !o.is_empty() => {
                    restored.insert(domain, o);
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "Discarding unreadable bundle override"),
            }
        }
        let count = restored.len();
        match self.overrides.write() {
            Ok(mut guard) => *guard = restored,
            Err(poisoned) => *poisoned.into_inner() = restored,
        }
        info!(count, "Bundle overrides hydrated");
        count
    }

    /// Compare one bundle against a freshly computed canonical hash.
    pub fn diff(&self, domain: Domain) -> RegistryResult<BundleDiff> {
        let bundle = self
            .state()
            .bundles
            .get(&domain)
            .cloned()
            .ok_or(RegistryError::UnknownBundle(domain))?;
        let snapshot = self.rule_source.snapshot()?;
        let canonical_hash = snapshot.canonical_hash()?;
        Ok(BundleDiff {
            domain,
            version: bundle.version.clone(),
            hash_matches: bundle.content_hash == canonical_hash,
            bundle_hash: bundle.content_hash,
            canonical_hash,
            bundle_source_version: bundle.source_version,
            canonical_source_version: snapshot.version,
            overridden_fields: self
                .overrides_for(domain)
                .map(|o| o.fields())
                .unwrap_or_default(),
        })
    }
}

/// Supported bundle files in lexical order.
fn bundle_files(dir: &Path) -> RegistryResult<Vec<(PathBuf, BundleFormat)>> {
    let mut files = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter_map(|path| BundleFormat::from_path(&path).map(|format| (path, format)))
        .collect::<Vec<_>>();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::TermEntry;
    use crate::source::{RuleSourceSnapshot, StaticRuleSource};
    use doctrine_store::InMemoryStore;
    use tempfile::TempDir;

    fn snapshot() -> RuleSourceSnapshot {
        RuleSourceSnapshot {
            version: "2026.10".into(),
            base_doctrine: "Price seeks liquidity.".into(),
            forbidden_global: vec!["guaranteed".into()],
            ..Default::default()
        }
    }

    fn bundle(domain: &str, hash: &str) -> PlaybookFile {
        PlaybookFile {
            domain: Some(domain.into()),
            version: Some("2".into()),
            source_tag: Some(CANONICAL_SOURCE_TAG.into()),
            source_version: Some("2026.10".into()),
            content_hash: Some(hash.into()),
            generated_at: Some(Utc::now()),
            terminology: vec![TermEntry {
                term: format!("{domain} window"),
                definition: "a period".into(),
            }],
            constraints: vec![format!("{domain} constraint")],
            ..Default::default()
        }
    }

    struct Fixture {
        dir: TempDir,
        source: Arc<StaticRuleSource>,
        store: Arc<InMemoryStore>,
        registry: PlaybookRegistry,
        hash: String,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(StaticRuleSource::new(snapshot()));
        let store = Arc::new(InMemoryStore::new());
        let registry = PlaybookRegistry::new(source.clone(), BestEffortStore::new(store.clone()));
        let hash = snapshot().canonical_hash().unwrap();
        Fixture {
            dir,
            source,
            store,
            registry,
            hash,
        }
    }

    fn write(dir: &Path, name: &str, file: &PlaybookFile) {
        let path = dir.join(name);
        file.write(&path, BundleFormat::from_path(&path).unwrap())
            .unwrap();
    }

    #[test]
    fn synchronized_when_all_hashes_match() {
        let f = fixture();
        write(f.dir.path(), "execution.json", &bundle("execution", &f.hash));
        write(f.dir.path(), "process.yaml", &bundle("process", &f.hash));

        let report = f.registry.load_all(f.dir.path()).unwrap();
        assert_eq!(report.admitted.len(), 2);
        assert!(!report.safe_mode);
        assert!(f.registry.is_synchronized());
        let text = f.registry.injection_text(Domain::Execution);
        assert!(text.contains("execution constraint"));
        assert_eq!(f.registry.injection_text(Domain::Reflective), "");
    }

    #[test]
    fn one_mismatch_puts_every_domain_in_safe_mode() {
        let f = fixture();
        write(f.dir.path(), "a.json", &bundle("execution", &f.hash));
        write(f.dir.path(), "b.json", &bundle("process", "stale-hash"));

        f.registry.load_all(f.dir.path()).unwrap();
        let state = f.registry.state();
        assert!(state.safe_mode);
        assert_eq!(state.mismatch_details, vec!["process".to_string()]);
        assert!(!f.registry.is_synchronized());
        assert_eq!(f.registry.injection_text(Domain::Execution), "");
        assert_eq!(f.registry.injection_text(Domain::Process), "");
        assert!(f.registry.all_terms().is_empty());
        match f.registry.verify_consistency() {
            Err(RegistryError::Consistency(domains)) => assert_eq!(domains, vec!["process"]),
            other => panic!("expected consistency error, got {other:?}"),
        }
    }

    #[test]
    fn empty_registry_is_not_synchronized() {
        let f = fixture();
        f.registry.load_all(f.dir.path()).unwrap();
        assert!(!f.registry.is_safe_mode());
        assert!(!f.registry.is_synchronized());
        assert!(f.registry.verify_consistency().is_ok());
    }

    #[test]
    fn provenance_failures_skip_only_that_bundle() {
        let f = fixture();
        let mut missing = bundle("execution", &f.hash);
        missing.source_version = None;
        write(f.dir.path(), "a.json", &missing);
        write(f.dir.path(), "b.json", &bundle("process", &f.hash));
        std::fs::write(f.dir.path().join("c.json"), "{ not json").unwrap();
        std::fs::write(f.dir.path().join("notes.txt"), "ignored").unwrap();

        let report = f.registry.load_all(f.dir.path()).unwrap();
        assert_eq!(report.admitted, vec!["process@2".to_string()]);
        assert_eq!(report.rejected.len(), 2);
        assert!(f.registry.is_synchronized());
    }

    #[test]
    fn duplicate_domain_keeps_first_file() {
        let f = fixture();
        write(f.dir.path(), "a.json", &bundle("execution", &f.hash));
        let mut second = bundle("execution", &f.hash);
        second.version = Some("9".into());
        write(f.dir.path(), "b.json", &second);
        f.registry.load_all(f.dir.path()).unwrap();
        assert_eq!(f.registry.get_bundle(Domain::Execution).unwrap().version, "2");
        assert_eq!(f.registry.state().rejected.len(), 1);
    }

    #[test]
    fn changed_rule_source_triggers_safe_mode_on_reload() {
        let f = fixture();
        write(f.dir.path(), "a.json", &bundle("execution", &f.hash));
        f.registry.load_all(f.dir.path()).unwrap();
        assert!(f.registry.is_synchronized());

        let mut next = snapshot();
        next.forbidden_global.push("risk free".into());
        f.source.replace(next);
        let report = f.registry.reload().unwrap();
        assert!(report.safe_mode);
        assert_eq!(report.mismatches, vec!["execution".to_string()]);
    }

    #[test]
    fn regenerate_clears_safe_mode() {
        let f = fixture();
        write(f.dir.path(), "a.json", &bundle("execution", "old"));
        write(f.dir.path(), "b.yaml", &bundle("process", "old"));
        f.registry.load_all(f.dir.path()).unwrap();
        assert!(f.registry.is_safe_mode());

        let report = f.registry.regenerate_all().unwrap();
        assert_eq!(report.regenerated.len(), 2);
        assert_eq!(report.canonical_hash, f.hash);
        assert!(!report.load.safe_mode);
        assert!(f.registry.is_synchronized());
        assert!(!f.registry.injection_text(Domain::Process).is_empty());
    }

    #[test]
    fn regenerate_requires_a_prior_load() {
        let f = fixture();
        assert!(matches!(
            f.registry.regenerate_all(),
            Err(RegistryError::NotLoaded)
        ));
    }

    #[test]
    fn diff_reports_mismatch() {
        let f = fixture();
        write(f.dir.path(), "a.json", &bundle("execution", "old"));
        f.registry.load_all(f.dir.path()).unwrap();
        let diff = f.registry.diff(Domain::Execution).unwrap();
        assert!(!diff.hash_matches);
        assert_eq!(diff.canonical_hash, f.hash);
        assert!(matches!(
            f.registry.diff(Domain::Reflective),
            Err(RegistryError::UnknownBundle(Domain::Reflective))
        ));
    }

    #[tokio::test]
    async fn overrides_apply_persist_and_hydrate() {
        let f = fixture();
        write(f.dir.path(), "a.json", &bundle("execution", &f.hash));
        f.registry.load_all(f.dir.path()).unwrap();

        f.registry
            .update_field(
                Domain::Execution,
                BundleField::Constraints(vec!["wait for the close".into()]),
            )
            .await
            .unwrap();
        let text = f.registry.injection_text(Domain::Execution);
        assert!(text.contains("wait for the close"));
        assert!(!text.contains("execution constraint"));
        assert_eq!(
            f.registry.diff(Domain::Execution).unwrap().overridden_fields,
            vec!["constraints"]
        );
        assert!(f.registry.diff(Domain::Execution).unwrap().hash_matches);

        // A second registry over the same store sees the override.
        let other = PlaybookRegistry::new(f.source.clone(), BestEffortStore::new(f.store.clone()));
        other.load_all(f.dir.path()).unwrap();
        assert_eq!(other.hydrate_overrides().await, 1);
        assert!(other
            .injection_text(Domain::Execution)
            .contains("wait for the close"));

        f.registry.clear_overrides(Domain::Execution).await;
        assert!(f
            .registry
            .injection_text(Domain::Execution)
            .contains("execution constraint"));
    }

    #[tokio::test]
    async fn override_requires_loaded_bundle() {
        let f = fixture();
        let err = f
            .registry
            .update_field(Domain::Execution, BundleField::Constraints(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownBundle(Domain::Execution)));
    }

    #[test]
    fn validate_terms_uses_loaded_terminology() {
        let f = fixture();
        write(f.dir.path(), "a.json", &bundle("execution", &f.hash));
        f.registry.load_all(f.dir.path()).unwrap();
        let warnings = f.registry.validate_terms("the window opened");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].canonical_term, "execution window");
    }
}
