//! Shared fixtures for the end-to-end suite.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use doctrine_engine::GovernanceEngine;
use doctrine_registry::{
    BundleFormat, PlaybookFile, RuleSourceSnapshot, StaticRuleSource, TermEntry,
    CANONICAL_SOURCE_TAG,
};
use doctrine_store::{BestEffortStore, InMemoryStore};
use doctrine_types::{GovernanceThresholds, HistoryEvent, Side};
use std::path::Path;
use std::sync::Arc;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn snapshot() -> RuleSourceSnapshot {
    RuleSourceSnapshot {
        version: "2026.10".into(),
        base_doctrine: "Price seeks liquidity; risk is defined before entry.".into(),
        forbidden_global: vec!["guaranteed".into(), "can't lose".into()],
        validation_patterns: vec![r"\bstop\b".into()],
        ..Default::default()
    }
}

pub fn bundle(domain: &str, hash: &str) -> PlaybookFile {
    PlaybookFile {
        domain: Some(domain.into()),
        version: Some("3".into()),
        source_tag: Some(CANONICAL_SOURCE_TAG.into()),
        source_version: Some("2026.10".into()),
        content_hash: Some(hash.into()),
        generated_at: Some(t0()),
        terminology: vec![TermEntry {
            term: "liquidity sweep".into(),
            definition: "a run on resting orders".into(),
        }],
        structural_rules: vec![format!("{domain} rule one")],
        constraints: vec![format!("{domain} constraint")],
        ..Default::default()
    }
}

pub fn write_bundle(dir: &Path, name: &str, file: &PlaybookFile) {
    let path = dir.join(name);
    file.write(&path, BundleFormat::from_path(&path).unwrap())
        .unwrap();
}

pub struct Harness {
    pub engine: Arc<GovernanceEngine>,
    pub store: Arc<InMemoryStore>,
    pub source: Arc<StaticRuleSource>,
}

pub fn harness() -> Harness {
    harness_on(Arc::new(InMemoryStore::new()))
}

/// Engine over an existing store, as after a restart.
pub fn harness_on(store: Arc<InMemoryStore>) -> Harness {
    let source = Arc::new(StaticRuleSource::new(snapshot()));
    let engine = GovernanceEngine::new(
        BestEffortStore::new(store.clone()),
        source.clone(),
        GovernanceThresholds::default(),
    )
    .unwrap();
    Harness {
        engine: Arc::new(engine),
        store,
        source,
    }
}

/// Losing outcomes one day apart, average loss stepping from 5.0 to 8.0.
pub fn drifting_history() -> Vec<HistoryEvent> {
    let start = Utc.with_ymd_and_hms(2026, 2, 1, 15, 0, 0).unwrap();
    (0..20)
        .map(|i| HistoryEvent {
            event_id: format!("d{i}"),
            closed_at: start + Duration::days(i),
            pnl: if i < 10 { -5.0 } else { -8.0 },
            side: if i % 2 == 0 { Side::Long } else { Side::Short },
            category: format!("setup-{}", i % 4),
            regime: None,
            edge_score: None,
        })
        .collect()
}

/// Same shape, with one non-finite outcome the engine must reject.
pub fn corrupt_history() -> Vec<HistoryEvent> {
    let mut history = drifting_history();
    history[3].pnl = f64::NAN;
    history
}
