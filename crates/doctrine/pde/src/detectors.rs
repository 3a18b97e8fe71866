//! The six behavioural drift detectors.
//!
//! Every detector receives the full history sorted by `closed_at` and
//! returns at most one alert. Confidence grows monotonically with the size
//! of the detected deviation and never exceeds [`MAX_CONFIDENCE`].

use doctrine_types::{HistoryEvent, PatternAlert, PatternCategory, Side};
use std::collections::HashMap;

pub type Detector = fn(&[HistoryEvent]) -> Option<PatternAlert>;

/// Static detector table, run in this order.
pub const DETECTORS: [(PatternCategory, Detector); 6] = [
    (PatternCategory::ExecutionDrift, execution_drift as Detector),
    (PatternCategory::BiasInterference, bias_interference as Detector),
    (PatternCategory::RegimeMismatch, regime_mismatch as Detector),
    (PatternCategory::OvertradingAfterLoss, overtrading_after_loss as Detector),
    (PatternCategory::EdgeDecay, edge_decay as Detector),
    (PatternCategory::EntropyCollapse, entropy_collapse as Detector),
];

pub const MAX_CONFIDENCE: f64 = 0.95;

pub const DRIFT_WINDOW: usize = 20;
pub const DRIFT_MIN_LOSSES: usize = 6;
pub const DRIFT_RATIO: f64 = 1.30;

pub const BIAS_WINDOW: usize = 10;
pub const BIAS_SHARE: f64 = 0.75;
pub const BIAS_MIN_COUNT: usize = 3;

pub const REGIME_MIN_MISMATCHES: usize = 3;

pub const OVERTRADING_MIN_PAIRS: usize = 3;

pub const EDGE_WINDOW: usize = 20;
pub const EDGE_MIN_SCORED: usize = 6;
pub const EDGE_DECLINE: f64 = 0.30;

pub const ENTROPY_WINDOW: usize = 10;
pub const ENTROPY_FULL_MIN: usize = 10;
pub const ENTROPY_PARTIAL_MIN: usize = 8;
pub const ENTROPY_PARTIAL_SHARE: f64 = 0.80;

fn capped(confidence: f64) -> f64 {
    confidence.clamp(0.0, MAX_CONFIDENCE)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn trailing<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Later half of the trailing losses is markedly larger than the earlier half.
pub fn execution_drift(history: &[HistoryEvent]) -> Option<PatternAlert> {
    let losses = history
        .iter()
        .filter(|e| e.is_loss())
        .map(|e| e.loss_magnitude())
        .collect::<Vec<_>>();
    let window = trailing(&losses, DRIFT_WINDOW);
    if window.len() < DRIFT_MIN_LOSSES {
        return None;
    }
    let (earlier, later) = window.split_at(window.len() / 2);
    let earlier_avg = mean(earlier);
    let later_avg = mean(later);
    if earlier_avg <= 0.0 {
        return None;
    }
    let ratio = later_avg / earlier_avg;
    if ratio <= DRIFT_RATIO {
        return None;
    }
    Some(
        PatternAlert::new(
            PatternCategory::ExecutionDrift,
            capped(0.5 + (ratio - DRIFT_RATIO)),
            window.len(),
            format!(
                "Average loss grew {:.0}% across the last {} losing outcomes",
                (ratio - 1.0) * 100.0,
                window.len()
            ),
        )
        .with_evidence("earlier_avg_loss", earlier_avg)
        .with_evidence("later_avg_loss", later_avg)
        .with_evidence("ratio", ratio),
    )
}

/// Recent losses concentrate on one directional side.
pub fn bias_interference(history: &[HistoryEvent]) -> Option<PatternAlert> {
    let losses = history.iter().filter(|e| e.is_loss()).collect::<Vec<_>>();
    let window = trailing(&losses, BIAS_WINDOW);
    if window.len() < BIAS_MIN_COUNT {
        return None;
    }
    let longs = window.iter().filter(|e| e.side == Side::Long).count();
    let shorts = window.len() - longs;
    let (side, count) = if longs >= shorts {
        ("long", longs)
    } else {
        ("short", shorts)
    };
    let share = count as f64 / window.len() as f64;
    if share < BIAS_SHARE || count < BIAS_MIN_COUNT {
        return None;
    }
    Some(
        PatternAlert::new(
            PatternCategory::BiasInterference,
            capped(0.5 + 2.0 * (share - BIAS_SHARE)),
            window.len(),
            format!(
                "{count} of the last {} losses were {side}",
                window.len()
            ),
        )
        .with_evidence("side", side)
        .with_evidence("share", share),
    )
}

/// Losses taken against the labelled environment.
pub fn regime_mismatch(history: &[HistoryEvent]) -> Option<PatternAlert> {
    let labelled = history
        .iter()
        .filter(|e| e.is_loss())
        .filter_map(|e| e.regime.map(|r| (r, e.side)))
        .collect::<Vec<_>>();
    let mismatches = labelled
        .iter()
        .filter(|(regime, side)| regime.contradicts(*side))
        .count();
    if mismatches < REGIME_MIN_MISMATCHES {
        return None;
    }
    let ratio = mismatches as f64 / labelled.len() as f64;
    Some(
        PatternAlert::new(
            PatternCategory::RegimeMismatch,
            capped(0.4 + 0.5 * ratio),
            labelled.len(),
            format!(
                "{mismatches} of {} labelled losses fought the prevailing regime",
                labelled.len()
            ),
        )
        .with_evidence("mismatches", mismatches)
        .with_evidence("ratio", ratio),
    )
}

/// Same-day losses immediately followed by another loss.
pub fn overtrading_after_loss(history: &[HistoryEvent]) -> Option<PatternAlert> {
    let pairs = history
        .windows(2)
        .filter(|w| {
            w[0].is_loss()
                && w[1].is_loss()
                && w[0].closed_at.date_naive() == w[1].closed_at.date_naive()
        })
        .count();
    if pairs < OVERTRADING_MIN_PAIRS {
        return None;
    }
    Some(
        PatternAlert::new(
            PatternCategory::OvertradingAfterLoss,
            capped(0.6 + 0.05 * (pairs - OVERTRADING_MIN_PAIRS) as f64),
            history.len(),
            format!("{pairs} same-day loss-after-loss sequences"),
        )
        .with_evidence("pairs", pairs),
    )
}

/// Quality scores in the later half of the window fell away.
pub fn edge_decay(history: &[HistoryEvent]) -> Option<PatternAlert> {
    let scores = history
        .iter()
        .filter_map(|e| e.edge_score)
        .collect::<Vec<_>>();
    let window = trailing(&scores, EDGE_WINDOW);
    if window.len() < EDGE_MIN_SCORED {
        return None;
    }
    let (earlier, later) = window.split_at(window.len() / 2);
    let earlier_avg = mean(earlier);
    let later_avg = mean(later);
    if earlier_avg <= 0.0 {
        return None;
    }
    let decline = (earlier_avg - later_avg) / earlier_avg;
    if decline < EDGE_DECLINE {
        return None;
    }
    Some(
        PatternAlert::new(
            PatternCategory::EdgeDecay,
            capped(0.5 + decline),
            window.len(),
            format!("Average edge score fell {:.0}%", decline * 100.0),
        )
        .with_evidence("earlier_avg_score", earlier_avg)
        .with_evidence("later_avg_score", later_avg)
        .with_evidence("decline", decline),
    )
}

/// One signature category dominates recent activity.
pub fn entropy_collapse(history: &[HistoryEvent]) -> Option<PatternAlert> {
    let window = trailing(history, ENTROPY_WINDOW);
    if window.len() < ENTROPY_PARTIAL_MIN {
        return None;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for event in window {
        *counts.entry(event.category.as_str()).or_default() += 1;
    }
    // Ties resolve to the lexically smallest category for determinism.
    let (category, count) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))?;
    let share = count as f64 / window.len() as f64;
    let total_collapse = window.len() >= ENTROPY_FULL_MIN && count == window.len();
    let partial_collapse = share > ENTROPY_PARTIAL_SHARE;
    if !total_collapse && !partial_collapse {
        return None;
    }
    Some(
        PatternAlert::new(
            PatternCategory::EntropyCollapse,
            capped(0.5 + 2.0 * (share - ENTROPY_PARTIAL_SHARE)),
            window.len(),
            format!(
                "{count} of the last {} entries used the {category} signature",
                window.len()
            ),
        )
        .with_evidence("category", category)
        .with_evidence("share", share),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use doctrine_types::Regime;

    /// Events one hour apart starting at a fixed instant.
    pub(crate) fn events(pnls: &[f64]) -> Vec<HistoryEvent> {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        pnls.iter()
            .enumerate()
            .map(|(i, pnl)| HistoryEvent {
                event_id: format!("e{i}"),
                closed_at: start + Duration::hours(i as i64),
                pnl: *pnl,
                side: if i % 2 == 0 { Side::Long } else { Side::Short },
                category: format!("setup-{}", i % 4),
                regime: None,
                edge_score: None,
            })
            .collect()
    }

    fn spread_days(mut history: Vec<HistoryEvent>) -> Vec<HistoryEvent> {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        for (i, e) in history.iter_mut().enumerate() {
            e.closed_at = start + Duration::days(i as i64);
        }
        history
    }

    #[test]
    fn execution_drift_fires_on_growing_losses() {
        let mut pnls = vec![-5.0; 10];
        pnls.extend(vec![-8.0; 10]);
        let alert = execution_drift(&events(&pnls)).unwrap();
        assert_eq!(alert.category, PatternCategory::ExecutionDrift);
        assert!(alert.confidence > 0.5);
        assert!((alert.confidence - 0.8).abs() < 1e-9);
        assert_eq!(alert.sample_size, 20);
    }

    #[test]
    fn execution_drift_ignores_small_growth() {
        let mut pnls = vec![-5.0; 10];
        pnls.extend(vec![-6.0; 10]);
        assert!(execution_drift(&events(&pnls)).is_none());
    }

    #[test]
    fn execution_drift_confidence_is_monotonic_and_capped() {
        let conf = |later: f64| {
            let mut pnls = vec![-5.0; 10];
            pnls.extend(vec![-later; 10]);
            execution_drift(&events(&pnls)).unwrap().confidence
        };
        assert!(conf(7.0) < conf(8.0));
        assert!(conf(8.0) < conf(9.0));
        assert_eq!(conf(50.0), MAX_CONFIDENCE);
    }

    #[test]
    fn bias_interference_fires_on_one_sided_losses() {
        let mut history = events(&[-1.0; 10]);
        for e in history.iter_mut() {
            e.side = Side::Short;
        }
        history[4].side = Side::Long;
        let alert = bias_interference(&history).unwrap();
        assert_eq!(alert.evidence["side"], "short");
        assert!((alert.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn bias_interference_quiet_when_balanced() {
        assert!(bias_interference(&events(&[-1.0; 10])).is_none());
    }

    #[test]
    fn regime_mismatch_counts_contradicting_losses() {
        let mut history = events(&[-1.0, -1.0, -1.0, -1.0, 2.0]);
        for e in history.iter_mut() {
            e.side = Side::Long;
            e.regime = Some(Regime::TrendingDown);
        }
        history[3].regime = Some(Regime::TrendingUp);
        let alert = regime_mismatch(&history).unwrap();
        assert_eq!(alert.evidence["mismatches"], 3);
        assert_eq!(alert.sample_size, 4);
        assert!((alert.confidence - (0.4 + 0.5 * 0.75)).abs() < 1e-9);
    }

    #[test]
    fn regime_mismatch_needs_three() {
        let mut history = events(&[-1.0, -1.0, 3.0]);
        for e in history.iter_mut() {
            e.side = Side::Short;
            e.regime = Some(Regime::TrendingUp);
        }
        assert!(regime_mismatch(&history).is_none());
    }

    #[test]
    fn overtrading_counts_same_day_pairs_only() {
        // Four consecutive same-day losses give three adjacent pairs.
        let alert = overtrading_after_loss(&events(&[-1.0, -1.0, -1.0, -1.0, 1.0])).unwrap();
        assert_eq!(alert.evidence["pairs"], 3);
        assert!((alert.confidence - 0.6).abs() < 1e-9);

        let spread = spread_days(events(&[-1.0, -1.0, -1.0, -1.0, 1.0]));
        assert!(overtrading_after_loss(&spread).is_none());
    }

    #[test]
    fn edge_decay_fires_on_falling_scores() {
        let mut history = events(&[1.0; 12]);
        for (i, e) in history.iter_mut().enumerate() {
            e.edge_score = Some(if i < 6 { 0.8 } else { 0.4 });
        }
        let alert = edge_decay(&history).unwrap();
        assert!((alert.evidence["decline"].as_f64().unwrap() - 0.5).abs() < 1e-9);
        assert!((alert.confidence - MAX_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn edge_decay_quiet_for_stable_scores() {
        let mut history = events(&[1.0; 12]);
        for (i, e) in history.iter_mut().enumerate() {
            e.edge_score = Some(if i < 6 { 0.8 } else { 0.7 });
        }
        assert!(edge_decay(&history).is_none());
    }

    #[test]
    fn entropy_collapse_on_single_category() {
        let mut history = events(&[1.0; 12]);
        for e in history.iter_mut() {
            e.category = "breakout".into();
        }
        let alert = entropy_collapse(&history).unwrap();
        assert_eq!(alert.evidence["category"], "breakout");
        assert!((alert.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn entropy_collapse_partial_threshold() {
        let mut history = events(&[1.0; 10]);
        for e in history.iter_mut() {
            e.category = "breakout".into();
        }
        history[0].category = "reversal".into();
        let alert = entropy_collapse(&history).unwrap();
        assert!((alert.confidence - 0.7).abs() < 1e-9);

        history[1].category = "reversal".into();
        assert!(entropy_collapse(&history).is_none());
    }

    #[test]
    fn entropy_collapse_quiet_for_diverse_history() {
        assert!(entropy_collapse(&events(&[1.0; 12])).is_none());
    }

    #[test]
    fn detector_table_covers_every_category_once() {
        let categories = DETECTORS.iter().map(|(c, _)| *c).collect::<Vec<_>>();
        assert_eq!(categories, PatternCategory::ALL.to_vec());
    }
}
