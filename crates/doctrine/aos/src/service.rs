//! Overlay gating and the caches behind it.

use crate::keys;
use crate::stats::{GateCounters, GateOutcome};
use crate::{AosError, AosResult, AosStats};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use doctrine_store::BestEffortStore;
use doctrine_types::{GovernanceThresholds, OverlayRecord, PatternAlert, PatternCategory};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Entries recovered from the durable store by a hydration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrationReport {
    pub overlays: usize,
    pub ledgers: usize,
    pub cooldowns: usize,
    pub suppressed: usize,
}

/// Admin Orchestration Service.
///
/// Owns overlay, budget, cooldown and suppression state. One active overlay
/// is kept per user; a newer overlay replaces the older one.
pub struct AdminOrchestrationService {
    store: BestEffortStore,
    thresholds: RwLock<GovernanceThresholds>,
    overlays: DashMap<String, OverlayRecord>,
    ledgers: DashMap<String, Vec<DateTime<Utc>>>,
    cooldowns: DashMap<(String, PatternCategory), DateTime<Utc>>,
    suppressed: DashSet<String>,
    counters: GateCounters,
}

fn ttl_until(now: DateTime<Utc>, until: DateTime<Utc>) -> Option<std::time::Duration> {
    (until - now).to_std().ok().filter(|d| !d.is_zero())
}

fn prune(ledger: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>) {
    let cutoff = now - GovernanceThresholds::budget_window();
    ledger.retain(|ts| *ts > cutoff);
}

fn valid_user(user_id: &str) -> bool {
    !user_id.is_empty() && !user_id.chars().any(char::is_whitespace)
}

impl AdminOrchestrationService {
    pub fn new(store: BestEffortStore, thresholds: GovernanceThresholds) -> Self {
        Self {
            store,
            thresholds: RwLock::new(thresholds),
            overlays: DashMap::new(),
            ledgers: DashMap::new(),
            cooldowns: DashMap::new(),
            suppressed: DashSet::new(),
            counters: GateCounters::default(),
        }
    }

    pub fn thresholds(&self) -> GovernanceThresholds {
        self.thresholds
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Replace the thresholds after validating them.
    ///
    /// Already created overlays, ledgers and cooldowns keep their expiry.
    pub fn update_thresholds(&self, thresholds: GovernanceThresholds) -> AosResult<()> {
        thresholds.validate()?;
        info!(
            min_confidence = thresholds.min_confidence,
            max_per_week = thresholds.max_per_week,
            cooldown_secs = thresholds.cooldown_secs,
            overlay_ttl_secs = thresholds.overlay_ttl_secs,
            "Governance thresholds updated"
        );
        *self.thresholds.write().unwrap_or_else(|p| p.into_inner()) = thresholds;
        Ok(())
    }

    pub async fn process_alerts(
        &self,
        alerts: &[PatternAlert],
        user_id: &str,
    ) -> Vec<OverlayRecord> {
        self.process_alerts_at(alerts, user_id, Utc::now()).await
    }

    /// Run each alert through the gates and create overlays for survivors.
    pub async fn process_alerts_at(
        &self,
        alerts: &[PatternAlert],
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<OverlayRecord> {
        if !valid_user(user_id) {
            warn!(user_id, "Ignoring alerts for invalid user id");
            return Vec::new();
        }
        let thresholds = self.thresholds();
        let mut created = Vec::new();

        for alert in alerts {
            if let Err(outcome) = self.precheck(user_id, alert, &thresholds, now) {
                self.reject(user_id, alert, outcome);
                continue;
            }
            if !self.claim_cooldown(user_id, alert.category, &thresholds, now).await {
                self.reject(user_id, alert, GateOutcome::CoolingDown);
                continue;
            }
            match self.commit(user_id, alert, &thresholds, now) {
                Ok((record, ledger)) => {
                    self.persist(&record, &ledger, now).await;
                    if self.suppressed.contains(user_id) {
                        // Suppressed while the overlay was being written.
                        self.evict(user_id).await;
                        self.reject(user_id, alert, GateOutcome::Suppressed);
                        continue;
                    }
                    self.counters.record(GateOutcome::Created);
                    info!(
                        user_id,
                        category = %record.category,
                        confidence = record.confidence,
                        expires_at = %record.expires_at,
                        "Overlay created"
                    );
                    created.push(record);
                }
                Err(outcome) => {
                    // Release the slot claimed above unless another task now owns it.
                    if outcome != GateOutcome::CoolingDown {
                        self.store
                            .delete(&keys::cooldown(user_id, alert.category))
                            .await;
                    }
                    self.reject(user_id, alert, outcome);
                }
            }
        }
        created
    }

    fn reject(&self, user_id: &str, alert: &PatternAlert, outcome: GateOutcome) {
        self.counters.record(outcome);
        debug!(
            user_id,
            category = %alert.category,
            confidence = alert.confidence,
            outcome = outcome.as_str(),
            "Alert did not pass overlay gates"
        );
    }

    /// Cheap cache-only gate pass, so rejected alerts never touch the store.
    fn precheck(
        &self,
        user_id: &str,
        alert: &PatternAlert,
        thresholds: &GovernanceThresholds,
        now: DateTime<Utc>,
    ) -> Result<(), GateOutcome> {
        if alert.confidence < thresholds.min_confidence {
            return Err(GateOutcome::BelowConfidence);
        }
        if self.suppressed.contains(user_id) {
            return Err(GateOutcome::Suppressed);
        }
        if self.cooling_down(user_id, alert.category, now) {
            return Err(GateOutcome::CoolingDown);
        }
        let used = match self.ledgers.get_mut(user_id) {
            Some(mut ledger) => {
                prune(&mut ledger, now);
                ledger.len()
            }
            None => 0,
        };
        if used >= thresholds.max_per_week {
            return Err(GateOutcome::BudgetExhausted);
        }
        Ok(())
    }

    fn cooling_down(&self, user_id: &str, category: PatternCategory, now: DateTime<Utc>) -> bool {
        self.cooldowns
            .get(&(user_id.to_string(), category))
            .is_some_and(|until| *until > now)
    }

    /// Claim the durable cooldown slot. Returns false when another writer
    /// holds a live one.
    async fn claim_cooldown(
        &self,
        user_id: &str,
        category: PatternCategory,
        thresholds: &GovernanceThresholds,
        now: DateTime<Utc>,
    ) -> bool {
        let key = keys::cooldown(user_id, category);
        let until = now + thresholds.cooldown();
        let value = until.to_rfc3339();
        let ttl = ttl_until(now, until);

        match self.store.set_if_absent(&key, value.clone(), ttl).await {
            Some(true) | None => true,
            Some(false) => {
                let held_until = self
                    .store
                    .get(&key)
                    .await
                    .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
                    .map(|ts| ts.with_timezone(&Utc));
                match held_until {
                    Some(held) if held > now => {
                        self.cooldowns.insert((user_id.to_string(), category), held);
                        false
                    }
                    // The stored slot has already lapsed.
                    _ => {
                        self.store.set(&key, value, ttl).await;
                        true
                    }
                }
            }
        }
    }

    /// Re-run the stateful gates under the user's ledger entry and apply the
    /// overlay to the caches.
    fn commit(
        &self,
        user_id: &str,
        alert: &PatternAlert,
        thresholds: &GovernanceThresholds,
        now: DateTime<Utc>,
    ) -> Result<(OverlayRecord, Vec<DateTime<Utc>>), GateOutcome> {
        let mut ledger = self.ledgers.entry(user_id.to_string()).or_default();
        prune(&mut ledger, now);

        if self.suppressed.contains(user_id) {
            return Err(GateOutcome::Suppressed);
        }
        if self.cooling_down(user_id, alert.category, now) {
            return Err(GateOutcome::CoolingDown);
        }
        if ledger.len() >= thresholds.max_per_week {
            return Err(GateOutcome::BudgetExhausted);
        }

        let record = OverlayRecord {
            user_id: user_id.to_string(),
            category: alert.category,
            label: alert.category.label().to_string(),
            summary: alert.summary.clone(),
            confidence: alert.confidence,
            sample_size: alert.sample_size,
            created_at: now,
            expires_at: now + thresholds.overlay_ttl(),
        };
        ledger.push(now);
        self.cooldowns.insert(
            (user_id.to_string(), alert.category),
            now + thresholds.cooldown(),
        );
        self.overlays.insert(user_id.to_string(), record.clone());
        Ok((record, ledger.to_vec()))
    }

    async fn persist(&self, record: &OverlayRecord, ledger: &[DateTime<Utc>], now: DateTime<Utc>) {
        match serde_json::to_string(record) {
            Ok(value) => {
                if let Some(ttl) = ttl_until(now, record.expires_at) {
                    self.store
                        .set(&keys::overlay(&record.user_id), value, Some(ttl))
                        .await;
                }
            }
            Err(error) => warn!(user_id = %record.user_id, error = %error, "Failed to encode overlay"),
        }
        match serde_json::to_string(ledger) {
            Ok(value) => {
                let ttl = GovernanceThresholds::budget_window().to_std().ok();
                self.store
                    .set(&keys::budget(&record.user_id), value, ttl)
                    .await;
            }
            Err(error) => warn!(user_id = %record.user_id, error = %error, "Failed to encode budget ledger"),
        }
    }

    pub async fn get_active(&self, user_id: &str) -> Option<OverlayRecord> {
        self.get_active_at(user_id, Utc::now()).await
    }

    async fn evict(&self, user_id: &str) {
        self.overlays.remove(user_id);
        self.store.delete(&keys::overlay(user_id)).await;
    }

    /// The user's live overlay. Expired overlays, and any overlay left behind
    /// for a suppressed user, are evicted from the cache and the store.
    pub async fn get_active_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<OverlayRecord> {
        if self.suppressed.contains(user_id) {
            self.evict(user_id).await;
            return None;
        }
        let cached = self.overlays.get(user_id).map(|r| r.value().clone());
        let record = match cached {
            Some(record) => record,
            None => {
                let raw = self.store.get(&keys::overlay(user_id)).await?;
                match serde_json::from_str::<OverlayRecord>(&raw) {
                    Ok(record) => record,
                    Err(error) => {
                        warn!(user_id, error = %error, "Discarding undecodable stored overlay");
                        self.store.delete(&keys::overlay(user_id)).await;
                        return None;
                    }
                }
            }
        };

        if record.is_expired_at(now) {
            self.overlays
                .remove_if(user_id, |_, r| r.is_expired_at(now));
            self.store.delete(&keys::overlay(user_id)).await;
            debug!(user_id, "Expired overlay evicted");
            return None;
        }
        self.overlays
            .entry(user_id.to_string())
            .or_insert_with(|| record.clone());
        Some(record)
    }

    pub async fn list_active(&self) -> Vec<OverlayRecord> {
        self.list_active_at(Utc::now()).await
    }

    /// Every live overlay, ordered by user id.
    pub async fn list_active_at(&self, now: DateTime<Utc>) -> Vec<OverlayRecord> {
        let users: Vec<String> = self.overlays.iter().map(|e| e.key().clone()).collect();
        let mut active = Vec::with_capacity(users.len());
        for user_id in users {
            if let Some(record) = self.get_active_at(&user_id, now).await {
                active.push(record);
            }
        }
        active.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        active
    }

    /// Drop the user's overlay. Budget and cooldown state is kept.
    pub async fn clear_active(&self, user_id: &str) -> bool {
        let removed = self.overlays.remove(user_id).is_some();
        self.store.delete(&keys::overlay(user_id)).await;
        if removed {
            info!(user_id, "Overlay cleared");
        }
        removed
    }

    /// Drop every overlay, including ones only present in the store.
    pub async fn clear_all(&self) -> usize {
        let mut users: Vec<String> = self.overlays.iter().map(|e| e.key().clone()).collect();
        for key in self.store.scan_prefix(keys::OVERLAY_PREFIX).await {
            if let Some(user_id) = key.strip_prefix(keys::OVERLAY_PREFIX) {
                if !users.iter().any(|u| u == user_id) {
                    users.push(user_id.to_string());
                }
            }
        }
        let mut cleared = 0;
        for user_id in &users {
            if self.overlays.remove(user_id).is_some() {
                cleared += 1;
            }
            self.store.delete(&keys::overlay(user_id)).await;
        }
        info!(cleared, "All overlays cleared");
        cleared
    }

    /// Suppress overlays for a user and evict the current one.
    pub async fn suppress(&self, user_id: &str) -> AosResult<()> {
        if !valid_user(user_id) {
            return Err(AosError::InvalidUser(user_id.to_string()));
        }
        self.suppressed.insert(user_id.to_string());
        self.store
            .set(&keys::suppressed(user_id), Utc::now().to_rfc3339(), None)
            .await;
        self.evict(user_id).await;
        info!(user_id, "User suppressed");
        Ok(())
    }

    pub async fn unsuppress(&self, user_id: &str) -> AosResult<()> {
        if !valid_user(user_id) {
            return Err(AosError::InvalidUser(user_id.to_string()));
        }
        self.suppressed.remove(user_id);
        self.store.delete(&keys::suppressed(user_id)).await;
        info!(user_id, "User unsuppressed");
        Ok(())
    }

    pub fn is_suppressed(&self, user_id: &str) -> bool {
        self.suppressed.contains(user_id)
    }

    pub async fn hydrate(&self) -> HydrationReport {
        self.hydrate_at(Utc::now()).await
    }

    /// Rebuild the caches from the durable store.
    ///
    /// Suppressions are restored first so no overlay of a suppressed user
    /// survives. Entries already lapsed at `now` are skipped. Cooldowns fall
    /// back to the key's residual TTL when the stored expiry cannot be read.
    pub async fn hydrate_at(&self, now: DateTime<Utc>) -> HydrationReport {
        let mut report = HydrationReport::default();

        for key in self.store.scan_prefix(keys::SUPPRESSED_PREFIX).await {
            if let Some(user_id) = key.strip_prefix(keys::SUPPRESSED_PREFIX) {
                if !user_id.is_empty() {
                    self.suppressed.insert(user_id.to_string());
                    report.suppressed += 1;
                }
            }
        }

        for key in self.store.scan_prefix(keys::OVERLAY_PREFIX).await {
            let Some(raw) = self.store.get(&key).await else {
                continue;
            };
            match serde_json::from_str::<OverlayRecord>(&raw) {
                Ok(record) if self.suppressed.contains(&record.user_id) => {
                    debug!(user_id = %record.user_id, "Dropping stored overlay of suppressed user");
                    self.store.delete(&key).await;
                }
                Ok(record) if !record.is_expired_at(now) => {
                    self.overlays.insert(record.user_id.clone(), record);
                    report.overlays += 1;
                }
                Ok(_) => self.store.delete(&key).await,
                Err(error) => warn!(key = %key, error = %error, "Skipping undecodable overlay"),
            }
        }

        for key in self.store.scan_prefix(keys::BUDGET_PREFIX).await {
            let Some(user_id) = key.strip_prefix(keys::BUDGET_PREFIX) else {
                continue;
            };
            let Some(raw) = self.store.get(&key).await else {
                continue;
            };
            match serde_json::from_str::<Vec<DateTime<Utc>>>(&raw) {
                Ok(mut ledger) => {
                    prune(&mut ledger, now);
                    if !ledger.is_empty() {
                        self.ledgers.insert(user_id.to_string(), ledger);
                        report.ledgers += 1;
                    }
                }
                Err(error) => warn!(key = %key, error = %error, "Skipping undecodable budget ledger"),
            }
        }

        for key in self.store.scan_prefix(keys::COOLDOWN_PREFIX).await {
            let Some((user_id, category)) = keys::parse_cooldown(&key) else {
                warn!(key = %key, "Skipping malformed cooldown key");
                continue;
            };
            let stored = self
                .store
                .get(&key)
                .await
                .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
                .map(|ts| ts.with_timezone(&Utc));
            let until = match stored {
                Some(until) => Some(until),
                None => self
                    .store
                    .ttl(&key)
                    .await
                    .and_then(|ttl| Duration::from_std(ttl).ok())
                    .map(|ttl| now + ttl),
            };
            if let Some(until) = until.filter(|until| *until > now) {
                self.cooldowns.insert((user_id, category), until);
                report.cooldowns += 1;
            }
        }

        info!(
            overlays = report.overlays,
            ledgers = report.ledgers,
            cooldowns = report.cooldowns,
            suppressed = report.suppressed,
            "Admin orchestration state hydrated"
        );
        report
    }

    /// Overlays created for the user in the trailing budget window.
    pub fn budget_used_at(&self, user_id: &str, now: DateTime<Utc>) -> usize {
        match self.ledgers.get_mut(user_id) {
            Some(mut ledger) => {
                prune(&mut ledger, now);
                ledger.len()
            }
            None => 0,
        }
    }

    pub fn stats(&self) -> AosStats {
        let now = Utc::now();
        AosStats {
            created: self.counters.get(GateOutcome::Created),
            below_confidence: self.counters.get(GateOutcome::BelowConfidence),
            suppressed: self.counters.get(GateOutcome::Suppressed),
            cooling_down: self.counters.get(GateOutcome::CoolingDown),
            budget_exhausted: self.counters.get(GateOutcome::BudgetExhausted),
            active_overlays: self.overlays.len(),
            suppressed_users: self.suppressed.len(),
            live_cooldowns: self.cooldowns.iter().filter(|e| *e.value() > now).count(),
        }
    }
}
