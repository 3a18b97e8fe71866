//! Durable store key layout.

use doctrine_types::PatternCategory;

pub(crate) const OVERLAY_PREFIX: &str = "doctrine:overlay:";
pub(crate) const BUDGET_PREFIX: &str = "doctrine:budget:";
pub(crate) const COOLDOWN_PREFIX: &str = "doctrine:cooldown:";
pub(crate) const SUPPRESSED_PREFIX: &str = "doctrine:suppressed:";

pub(crate) fn overlay(user_id: &str) -> String {
    format!("{OVERLAY_PREFIX}{user_id}")
}

pub(crate) fn budget(user_id: &str) -> String {
    format!("{BUDGET_PREFIX}{user_id}")
}

pub(crate) fn cooldown(user_id: &str, category: PatternCategory) -> String {
    format!("{COOLDOWN_PREFIX}{user_id}:{}", category.as_str())
}

pub(crate) fn suppressed(user_id: &str) -> String {
    format!("{SUPPRESSED_PREFIX}{user_id}")
}

/// Split a cooldown key back into user and category.
///
/// The category is the last segment, so user ids may contain `:`.
pub(crate) fn parse_cooldown(key: &str) -> Option<(String, PatternCategory)> {
    let rest = key.strip_prefix(COOLDOWN_PREFIX)?;
    let (user_id, category) = rest.rsplit_once(':')?;
    if user_id.is_empty() {
        return None;
    }
    Some((user_id.to_string(), PatternCategory::parse(category)?))
}
