//! End-to-end test: one stale bundle halts rule content and overlays for
//! every domain until the bundles are regenerated.

use crate::support::{bundle, harness, write_bundle};
use doctrine_engine::AuditAction;
use doctrine_types::{Domain, EnforcementMode, PatternAlert, PatternCategory};

#[tokio::test]
async fn one_mismatch_halts_every_domain() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let hash = crate::support::snapshot().canonical_hash().unwrap();
    write_bundle(dir.path(), "a_execution.json", &bundle("execution", &hash));
    write_bundle(dir.path(), "b_process.yaml", &bundle("process", "0000stale"));

    let startup = h.engine.initialize(dir.path()).await.unwrap();
    assert!(startup.load.safe_mode);

    let health = h.engine.health();
    assert!(health.registry.safe_mode);
    assert!(!health.registry.synchronized);
    assert_eq!(health.registry.mismatch_details, vec!["process".to_string()]);

    // Classification and resolution keep working.
    let decision = h.engine.evaluate("slippage on my limit order fills");
    assert_eq!(decision.classification.domain, Domain::Execution);
    assert_eq!(decision.mode, EnforcementMode::Strict);
    assert!(decision.safe_mode);
    for domain in Domain::PRIORITY {
        assert_eq!(h.engine.registry().injection_text(domain), "");
    }
    assert!(h.engine.registry().all_terms().is_empty());

    let alerts = vec![PatternAlert::new(PatternCategory::EdgeDecay, 0.9, 20, "decay")];
    assert!(h.engine.process_alerts(&alerts, "u1").await.is_empty());
}

#[tokio::test]
async fn regenerate_restores_synchronized_state() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "execution.json", &bundle("execution", "old"));
    write_bundle(dir.path(), "process.yml", &bundle("process", "old"));
    h.engine.initialize(dir.path()).await.unwrap();
    assert!(h.engine.registry().is_safe_mode());

    let report = h.engine.regenerate_bundles("ops").unwrap();
    assert_eq!(report.regenerated.len(), 2);
    assert!(!report.load.safe_mode);
    assert!(h.engine.registry().is_synchronized());

    let decision = h.engine.evaluate("slippage on my limit order fills");
    assert!(decision.injection_text.contains("execution constraint"));

    let diff = h.engine.diff_bundle(Domain::Process).unwrap();
    assert!(diff.hash_matches);

    let audit = h.engine.audit_log(5);
    assert_eq!(audit[0].action, AuditAction::RegenerateBundles);
    assert_eq!(audit[0].actor, "ops");

    let alerts = vec![PatternAlert::new(PatternCategory::EdgeDecay, 0.9, 20, "decay")];
    assert_eq!(h.engine.process_alerts(&alerts, "u1").await.len(), 1);
}

#[tokio::test]
async fn rule_source_change_is_detected_on_reload() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let hash = crate::support::snapshot().canonical_hash().unwrap();
    write_bundle(dir.path(), "execution.json", &bundle("execution", &hash));
    h.engine.initialize(dir.path()).await.unwrap();
    assert!(h.engine.registry().is_synchronized());

    let mut changed = crate::support::snapshot();
    changed.forbidden_global.push("risk-free".into());
    h.source.replace(changed);
    let report = h.engine.registry().reload().unwrap();
    assert!(report.safe_mode);
    assert_eq!(h.engine.registry().injection_text(Domain::Execution), "");
}
