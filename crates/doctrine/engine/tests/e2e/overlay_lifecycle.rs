//! End-to-end test: overlay gates, lifetime, suppression and restart.

use crate::support::{harness, harness_on, t0};
use chrono::Duration;
use doctrine_engine::{AuditAction, KillSwitch};
use doctrine_store::DurableStore;
use doctrine_types::{PatternAlert, PatternCategory};

fn alert(category: PatternCategory, confidence: f64) -> PatternAlert {
    PatternAlert::new(category, confidence, 20, format!("{category} observed"))
}

#[tokio::test]
async fn below_threshold_confidence_creates_nothing() {
    let h = harness();
    let created = h
        .engine
        .process_alerts_at(&[alert(PatternCategory::EdgeDecay, 0.65)], "u1", t0())
        .await;
    assert!(created.is_empty());
    assert_eq!(h.engine.health().overlays.below_confidence, 1);
}

#[tokio::test]
async fn weekly_budget_holds_over_any_trailing_window() {
    let h = harness();
    let mut now = t0();
    let mut created_at = Vec::new();
    // One alert per category every 12 hours for two weeks.
    for step in 0..28 {
        let category = PatternCategory::ALL[step % PatternCategory::ALL.len()];
        for record in h
            .engine
            .process_alerts_at(&[alert(category, 0.9)], "u1", now)
            .await
        {
            created_at.push(record.created_at);
        }
        now += Duration::hours(12);
    }

    assert!(!created_at.is_empty());
    for start in &created_at {
        let in_window = created_at
            .iter()
            .filter(|ts| **ts >= *start && **ts < *start + Duration::days(7))
            .count();
        assert!(in_window <= 5, "{in_window} overlays within a week of {start}");
    }
}

#[tokio::test]
async fn cooldown_rejects_repeat_category() {
    let h = harness();
    let first = h
        .engine
        .process_alerts_at(&[alert(PatternCategory::RegimeMismatch, 0.9)], "u1", t0())
        .await;
    assert_eq!(first.len(), 1);

    let repeat = h
        .engine
        .process_alerts_at(
            &[alert(PatternCategory::RegimeMismatch, 0.95)],
            "u1",
            t0() + Duration::hours(30),
        )
        .await;
    assert!(repeat.is_empty());
    assert_eq!(h.engine.health().overlays.cooling_down, 1);
}

#[tokio::test]
async fn overlay_expires_and_leaves_the_store() {
    let h = harness();
    let created = h
        .engine
        .process_alerts_at(&[alert(PatternCategory::EntropyCollapse, 0.8)], "u1", t0())
        .await;
    let record = &created[0];
    assert_eq!(record.expires_at - record.created_at, Duration::hours(24));

    let aos = h.engine.orchestration();
    assert!(aos.get_active_at("u1", record.expires_at - Duration::seconds(1)).await.is_some());
    assert!(aos.get_active_at("u1", record.expires_at).await.is_none());
    assert!(h.store.get("doctrine:overlay:u1").await.unwrap().is_none());
}

#[tokio::test]
async fn overlay_reaches_only_permissive_modes() {
    let h = harness();
    h.engine
        .process_alerts(&[alert(PatternCategory::OvertradingAfterLoss, 0.9)], "u1")
        .await;

    let reflective = h
        .engine
        .evaluate_for_user("u1", "I feel frustrated and on tilt today")
        .await;
    assert!(reflective.constraints.allow_overlay);
    assert_eq!(
        reflective.overlay.map(|o| o.category),
        Some(PatternCategory::OvertradingAfterLoss)
    );

    let strict = h
        .engine
        .evaluate_for_user("u1", "slippage on my limit order fills")
        .await;
    assert!(strict.overlay.is_none());

    h.engine.set_kill_switch("ops", KillSwitch::Overlays, false);
    let halted = h
        .engine
        .evaluate_for_user("u1", "I feel frustrated and on tilt today")
        .await;
    assert!(halted.overlay.is_none());
}

#[tokio::test]
async fn suppression_and_clearing_are_audited() {
    let h = harness();
    h.engine
        .process_alerts(&[alert(PatternCategory::EdgeDecay, 0.9)], "u1")
        .await;
    h.engine
        .process_alerts(&[alert(PatternCategory::EdgeDecay, 0.9)], "u2")
        .await;

    h.engine.suppress_user("ops", "u1").await.unwrap();
    assert_eq!(h.engine.active_overlays().await.len(), 1);
    assert!(h
        .engine
        .process_alerts(&[alert(PatternCategory::EntropyCollapse, 0.9)], "u1")
        .await
        .is_empty());

    assert_eq!(h.engine.clear_overlays("ops", None).await, 1);
    assert!(h.engine.active_overlays().await.is_empty());
    h.engine.unsuppress_user("ops", "u1").await.unwrap();

    let actions: Vec<_> = h.engine.audit_log(10).iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::UnsuppressUser,
            AuditAction::ClearOverlays,
            AuditAction::SuppressUser,
        ]
    );
}

#[tokio::test]
async fn restart_restores_overlay_state() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    h.engine
        .process_alerts(&[alert(PatternCategory::BiasInterference, 0.9)], "u1")
        .await;
    h.engine.suppress_user("ops", "u2").await.unwrap();

    let restarted = harness_on(h.store.clone());
    let startup = restarted.engine.initialize(dir.path()).await.unwrap();
    assert_eq!(startup.hydration.overlays, 1);
    assert_eq!(startup.hydration.suppressed, 1);

    // Cooldown survives the restart.
    assert!(restarted
        .engine
        .process_alerts(&[alert(PatternCategory::BiasInterference, 0.9)], "u1")
        .await
        .is_empty());
    assert_eq!(restarted.engine.active_overlays().await.len(), 1);
}
