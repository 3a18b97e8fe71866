//! End-to-end test: detection self-monitoring disables and heals.

use crate::support::{corrupt_history, drifting_history, harness};
use doctrine_engine::AuditAction;
use doctrine_pde::REASON_CONSECUTIVE_FAILURES;

#[tokio::test]
async fn three_failures_disable_and_a_fast_scan_heals() {
    let h = harness();
    for _ in 0..3 {
        assert!(h.engine.scan_user("u1", &corrupt_history()).await.is_err());
    }
    let health = h.engine.health().detection;
    assert!(health.auto_disabled);
    assert_eq!(
        health.auto_disable_reason.as_deref(),
        Some(REASON_CONSECUTIVE_FAILURES)
    );
    assert_eq!(health.consecutive_failures, 3);

    let created = h.engine.scan_user("u1", &drifting_history()).await.unwrap();
    assert_eq!(created.len(), 1);
    let health = h.engine.health().detection;
    assert!(!health.auto_disabled);
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.total_failures, 3);
}

#[tokio::test]
async fn short_history_leaves_health_untouched() {
    let h = harness();
    let created = h
        .engine
        .scan_user("u1", &drifting_history()[12..])
        .await
        .unwrap();
    assert!(created.is_empty());
    assert_eq!(h.engine.health().detection.total_scans, 0);
}

#[tokio::test]
async fn manual_reset_is_audited() {
    let h = harness();
    for _ in 0..3 {
        let _ = h.engine.scan_user("u1", &corrupt_history()).await;
    }
    assert!(h.engine.detection().is_disabled());

    h.engine.reset_detection_health("ops");
    assert!(!h.engine.detection().is_disabled());
    assert_eq!(
        h.engine.audit_log(1)[0].action,
        AuditAction::ResetDetectionHealth
    );
}
