//! Governance engine facade.
//!
//! Wires the classifier, resolver, registry, detection engine and overlay
//! service together and exposes the runtime and administrative surface.
//! Every mutating administrative call is recorded in the audit log.

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::kill_switch::{KillSwitch, KillSwitchState, KillSwitches};
use crate::EngineResult;
use chrono::{DateTime, Utc};
use doctrine_aos::{AdminOrchestrationService, AosError, AosStats, HydrationReport};
use doctrine_classifier::{ClassifierStats, DomainClassifier, ModeResolver, RouteEntry};
use doctrine_pde::{PatternDetectionEngine, PdeHealth, RecentAlert};
use doctrine_registry::{
    BundleDiff, BundleField, CanonicalRuleSource, LoadReport, Playbook, PlaybookRegistry,
    RegenerateReport, TermWarning,
};
use doctrine_store::BestEffortStore;
use doctrine_types::{
    ConstraintSet, Domain, DomainClassification, EnforcementMode, GovernanceThresholds,
    HistoryEvent, OverlayRecord, PatternAlert,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Advisory metadata handed to the policy consumer for one request.
#[derive(Debug, Clone, Serialize)]
pub struct GovernanceDecision {
    pub classification: DomainClassification,
    pub mode: EnforcementMode,
    pub constraints: ConstraintSet,
    pub ruleset_id: String,
    /// Empty while the registry is in safe mode.
    pub injection_text: String,
    pub term_warnings: Vec<TermWarning>,
    pub safe_mode: bool,
    /// Attached only when the mode allows overlays.
    pub overlay: Option<OverlayRecord>,
}

/// What [`GovernanceEngine::initialize`] restored.
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub load: LoadReport,
    pub overrides: usize,
    pub hydration: HydrationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryHealth {
    pub safe_mode: bool,
    pub synchronized: bool,
    pub bundles: usize,
    pub mismatch_details: Vec<String>,
    pub rejected: Vec<String>,
    pub canonical_hash: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub failures: u64,
    pub degraded: bool,
}

/// Aggregated health of every component.
#[derive(Debug, Clone, Serialize)]
pub struct EngineHealth {
    pub detection: PdeHealth,
    pub registry: RegistryHealth,
    pub overlays: AosStats,
    pub classifier: ClassifierStats,
    pub kill_switches: KillSwitchState,
    pub store: StoreHealth,
}

/// Doctrine governance engine.
pub struct GovernanceEngine {
    classifier: DomainClassifier,
    registry: PlaybookRegistry,
    detection: PatternDetectionEngine,
    overlays: AdminOrchestrationService,
    switches: KillSwitches,
    audit: AuditLog,
    store: BestEffortStore,
}

impl GovernanceEngine {
    pub fn new(
        store: BestEffortStore,
        rule_source: Arc<dyn CanonicalRuleSource>,
        thresholds: GovernanceThresholds,
    ) -> EngineResult<Self> {
        thresholds.validate().map_err(AosError::from)?;
        Ok(Self {
            classifier: DomainClassifier::new()?,
            registry: PlaybookRegistry::new(rule_source, store.clone()),
            detection: PatternDetectionEngine::new(),
            overlays: AdminOrchestrationService::new(store.clone(), thresholds),
            switches: KillSwitches::default(),
            audit: AuditLog::default(),
            store,
        })
    }

    /// Load bundles and rebuild cached state from the durable store.
    pub async fn initialize(&self, bundle_dir: &Path) -> EngineResult<StartupReport> {
        let load = self.registry.load_all(bundle_dir)?;
        let overrides = self.registry.hydrate_overrides().await;
        let hydration = self.overlays.hydrate().await;
        info!(
            bundles = load.admitted.len(),
            rejected = load.rejected.len(),
            safe_mode = load.safe_mode,
            overrides,
            overlays = hydration.overlays,
            "Governance engine initialized"
        );
        Ok(StartupReport {
            load,
            overrides,
            hydration,
        })
    }

    pub fn registry(&self) -> &PlaybookRegistry {
        &self.registry
    }

    pub fn detection(&self) -> &PatternDetectionEngine {
        &self.detection
    }

    pub fn orchestration(&self) -> &AdminOrchestrationService {
        &self.overlays
    }

    pub fn classifier(&self) -> &DomainClassifier {
        &self.classifier
    }

    pub(crate) fn is_enabled(&self, switch: KillSwitch) -> bool {
        self.switches.is_enabled(switch)
    }

    // ------------------------------------------------------------------
    // Runtime surface
    // ------------------------------------------------------------------

    /// Classify `text`, resolve its mode and gather rule content.
    pub fn evaluate(&self, text: &str) -> GovernanceDecision {
        let classification = if self.switches.is_enabled(KillSwitch::Classifier) {
            self.classifier.classify(text)
        } else {
            DomainClassification::fallback()
        };
        let (mode, constraints) = ModeResolver::resolve(&classification);
        let state = self.registry.state();

        GovernanceDecision {
            ruleset_id: classification.mapped_ruleset_id.clone(),
            injection_text: self.registry.injection_text(classification.domain),
            term_warnings: self.registry.validate_terms(text),
            safe_mode: state.safe_mode,
            classification,
            mode,
            constraints,
            overlay: None,
        }
    }

    /// [`evaluate`](Self::evaluate) plus the user's live overlay when the
    /// resolved mode, the registry and the overlay switch all allow it.
    pub async fn evaluate_for_user(&self, user_id: &str, text: &str) -> GovernanceDecision {
        let mut decision = self.evaluate(text);
        if decision.constraints.allow_overlay && self.overlays_allowed() {
            decision.overlay = self.overlays.get_active(user_id).await;
        }
        decision
    }

    fn overlays_allowed(&self) -> bool {
        self.switches.is_enabled(KillSwitch::Overlays) && !self.registry.is_safe_mode()
    }

    pub async fn process_alerts(&self, alerts: &[PatternAlert], user_id: &str) -> Vec<OverlayRecord> {
        self.process_alerts_at(alerts, user_id, Utc::now()).await
    }

    /// Feed alerts to the overlay gates. Halted while the registry is in
    /// safe mode or the overlay switch is off.
    pub async fn process_alerts_at(
        &self,
        alerts: &[PatternAlert],
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<OverlayRecord> {
        if let Err(error) = self.registry.verify_consistency() {
            debug!(user_id, alerts = alerts.len(), error = %error, "Overlay emission halted");
            return Vec::new();
        }
        if !self.switches.is_enabled(KillSwitch::Overlays) {
            debug!(user_id, alerts = alerts.len(), "Overlay switch off, emission halted");
            return Vec::new();
        }
        self.overlays.process_alerts_at(alerts, user_id, now).await
    }

    /// Scan one user's history and gate the resulting alerts.
    pub async fn scan_user(
        &self,
        user_id: &str,
        history: &[HistoryEvent],
    ) -> EngineResult<Vec<OverlayRecord>> {
        if !self.switches.is_enabled(KillSwitch::Pde) {
            return Ok(Vec::new());
        }
        let alerts = self.detection.scan(user_id, history)?;
        if alerts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.process_alerts(&alerts, user_id).await)
    }

    // ------------------------------------------------------------------
    // Bundles
    // ------------------------------------------------------------------

    pub fn list_bundles(&self) -> Vec<Playbook> {
        self.registry.list_bundles()
    }

    pub fn get_bundle(&self, domain: Domain) -> Option<Playbook> {
        self.registry.get_bundle(domain)
    }

    pub async fn update_bundle_field(
        &self,
        actor: &str,
        domain: Domain,
        field: BundleField,
    ) -> EngineResult<()> {
        let name = field.name();
        let result = self.registry.update_field(domain, field).await;
        self.audit.record(
            AuditEntry::new(actor, AuditAction::UpdateBundleField, domain.as_str())
                .context("field", name)
                .outcome(&result),
        );
        Ok(result?)
    }

    /// Re-stamp every bundle from the live canonical source and reload.
    /// The only way out of safe mode.
    pub fn regenerate_bundles(&self, actor: &str) -> EngineResult<RegenerateReport> {
        let result = self.registry.regenerate_all();
        let mut entry = AuditEntry::new(actor, AuditAction::RegenerateBundles, "bundles")
            .outcome(&result);
        if let Ok(report) = &result {
            entry = entry
                .context("regenerated", &report.regenerated)
                .context("safe_mode", report.load.safe_mode);
        }
        self.audit.record(entry);
        Ok(result?)
    }

    pub fn diff_bundle(&self, domain: Domain) -> EngineResult<BundleDiff> {
        Ok(self.registry.diff(domain)?)
    }

    // ------------------------------------------------------------------
    // Classifier
    // ------------------------------------------------------------------

    pub fn routing_map(&self) -> Vec<RouteEntry> {
        self.classifier.routing_map()
    }

    pub fn update_patterns(
        &self,
        actor: &str,
        domain: Domain,
        patterns: Vec<String>,
    ) -> EngineResult<()> {
        let count = patterns.len();
        let result = self.classifier.update_patterns(domain, patterns);
        self.audit.record(
            AuditEntry::new(actor, AuditAction::UpdatePatterns, domain.as_str())
                .context("patterns", count)
                .outcome(&result),
        );
        Ok(result?)
    }

    pub fn dry_run_classify(&self, text: &str) -> DomainClassification {
        self.classifier.dry_run(text)
    }

    // ------------------------------------------------------------------
    // Thresholds, switches, audit, health
    // ------------------------------------------------------------------

    pub fn thresholds(&self) -> GovernanceThresholds {
        self.overlays.thresholds()
    }

    /// Scan interval changes apply from the next scheduler start; everything
    /// else from the next alert or cycle.
    pub fn update_thresholds(&self, actor: &str, thresholds: GovernanceThresholds) -> EngineResult<()> {
        let result = self.overlays.update_thresholds(thresholds.clone());
        self.audit.record(
            AuditEntry::new(actor, AuditAction::UpdateThresholds, "thresholds")
                .context("thresholds", &thresholds)
                .outcome(&result),
        );
        Ok(result?)
    }

    pub fn kill_switches(&self) -> KillSwitchState {
        self.switches.state()
    }

    /// Returns the previous value.
    pub fn set_kill_switch(&self, actor: &str, switch: KillSwitch, enabled: bool) -> bool {
        let previous = self.switches.set(switch, enabled);
        if previous != enabled {
            warn!(switch = %switch, enabled, "Kill switch changed");
        }
        self.audit.record(
            AuditEntry::new(actor, AuditAction::SetKillSwitch, switch.as_str())
                .context("enabled", enabled)
                .context("previous", previous),
        );
        previous
    }

    /// Audit entries, newest first.
    pub fn audit_log(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit.recent(limit)
    }

    pub fn health(&self) -> EngineHealth {
        let state = self.registry.state();
        EngineHealth {
            detection: self.detection.health(),
            registry: RegistryHealth {
                safe_mode: state.safe_mode,
                synchronized: state.is_synchronized(),
                bundles: state.bundles.len(),
                mismatch_details: state.mismatch_details.clone(),
                rejected: state.rejected.clone(),
                canonical_hash: state.canonical_hash.clone(),
                loaded_at: state.loaded_at,
            },
            overlays: self.overlays.stats(),
            classifier: self.classifier.stats(),
            kill_switches: self.switches.state(),
            store: StoreHealth {
                failures: self.store.failures(),
                degraded: self.store.is_degraded(),
            },
        }
    }

    /// Clear the detection health record, re-enabling an auto-disabled engine.
    pub fn reset_detection_health(&self, actor: &str) {
        self.detection.tracker().reset();
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::ResetDetectionHealth,
            "detection",
        ));
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<RecentAlert> {
        self.detection.recent_alerts(limit)
    }

    // ------------------------------------------------------------------
    // Overlays
    // ------------------------------------------------------------------

    pub async fn active_overlays(&self) -> Vec<OverlayRecord> {
        self.overlays.list_active().await
    }

    /// Clear one user's overlay, or every overlay when `user_id` is `None`.
    pub async fn clear_overlays(&self, actor: &str, user_id: Option<&str>) -> usize {
        let cleared = match user_id {
            Some(user_id) => usize::from(self.overlays.clear_active(user_id).await),
            None => self.overlays.clear_all().await,
        };
        self.audit.record(
            AuditEntry::new(actor, AuditAction::ClearOverlays, user_id.unwrap_or("*"))
                .context("cleared", cleared),
        );
        cleared
    }

    pub async fn suppress_user(&self, actor: &str, user_id: &str) -> EngineResult<()> {
        let result = self.overlays.suppress(user_id).await;
        self.audit.record(
            AuditEntry::new(actor, AuditAction::SuppressUser, user_id).outcome(&result),
        );
        Ok(result?)
    }

    pub async fn unsuppress_user(&self, actor: &str, user_id: &str) -> EngineResult<()> {
        let result = self.overlays.unsuppress(user_id).await;
        self.audit.record(
            AuditEntry::new(actor, AuditAction::UnsuppressUser, user_id).outcome(&result),
        );
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditOutcome;
    use doctrine_registry::{RuleSourceSnapshot, StaticRuleSource};
    use doctrine_store::InMemoryStore;
    use doctrine_types::PatternCategory;

    fn engine() -> GovernanceEngine {
        GovernanceEngine::new(
            BestEffortStore::new(Arc::new(InMemoryStore::new())),
            Arc::new(StaticRuleSource::new(RuleSourceSnapshot::default())),
            GovernanceThresholds::default(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_thresholds_at_construction() {
        let result = GovernanceEngine::new(
            BestEffortStore::new(Arc::new(InMemoryStore::new())),
            Arc::new(StaticRuleSource::new(RuleSourceSnapshot::default())),
            GovernanceThresholds {
                max_per_week: 0,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn classifier_switch_forces_general_strict() {
        let engine = engine();
        engine.set_kill_switch("ops", KillSwitch::Classifier, false);
        let decision = engine.evaluate("what is the stop loss on this position size");
        assert_eq!(decision.classification.domain, Domain::General);
        assert_eq!(decision.mode, EnforcementMode::Strict);
        assert!(decision.injection_text.is_empty());
    }

    #[tokio::test]
    async fn overlay_switch_halts_emission() {
        let engine = engine();
        let alerts = vec![PatternAlert::new(PatternCategory::EdgeDecay, 0.9, 20, "decay")];
        engine.set_kill_switch("ops", KillSwitch::Overlays, false);
        assert!(engine.process_alerts(&alerts, "u1").await.is_empty());
        engine.set_kill_switch("ops", KillSwitch::Overlays, true);
        assert_eq!(engine.process_alerts(&alerts, "u1").await.len(), 1);
    }

    #[tokio::test]
    async fn failed_admin_calls_are_audited() {
        let engine = engine();
        let result = engine.update_patterns("alice", Domain::Execution, vec!["(".to_string()]);
        assert!(result.is_err());
        assert!(engine.suppress_user("alice", "").await.is_err());

        let log = engine.audit_log(10);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, AuditAction::SuppressUser);
        assert!(matches!(log[1].outcome, AuditOutcome::Failure { .. }));
        assert_eq!(log[1].actor, "alice");
    }
}
