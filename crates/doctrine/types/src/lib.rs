//! Shared types for the doctrine governance engine.
//!
//! Everything here is plain data: classification results, enforcement
//! modes and their constraint presets, pattern alerts, overlay records,
//! historical events and the tunable governance thresholds. The closed
//! enums (`Domain`, `EnforcementMode`, `PatternCategory`) are matched
//! exhaustively by the engine crates.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod domain;
mod error;
mod history;
mod overlay;
mod pattern;
mod thresholds;

pub use domain::{ConstraintSet, Domain, DomainClassification, EnforcementMode};
pub use error::{ThresholdError, ThresholdResult};
pub use history::{HistoryEvent, Regime, Side};
pub use overlay::OverlayRecord;
pub use pattern::{PatternAlert, PatternCategory};
pub use thresholds::{GovernanceThresholds, BUDGET_WINDOW_DAYS, MAX_DURATION_SECS};
