//! # doctrine-pde
//!
//! Pattern Detection Engine. Six independent statistical detectors run over
//! a user's closed history; each returns at most one [`PatternAlert`]. The
//! whole scan is wrapped by a [`HealthTracker`] that auto-disables the
//! engine after repeated failures or an over-long scan and re-enables it on
//! the next fast, successful scan.
//!
//! [`PatternAlert`]: doctrine_types::PatternAlert

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod detectors;
mod engine;
mod error;
mod health;
mod provider;

pub use detectors::{Detector, DETECTORS};
pub use engine::{PatternDetectionEngine, RecentAlert, ALERT_BUFFER_CAPACITY, MIN_SAMPLE_SIZE};
pub use error::{PdeError, PdeResult};
pub use health::{
    HealthTracker, PdeHealth, MAX_CONSECUTIVE_FAILURES, MAX_SCAN_LATENCY_MS,
    REASON_CONSECUTIVE_FAILURES, REASON_LATENCY_EXCEEDED,
};
pub use provider::{FileHistoryProvider, HistoryProvider, InMemoryHistoryProvider, UserDirectory};
