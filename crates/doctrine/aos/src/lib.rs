//! Admin Orchestration Service.
//!
//! Turns pattern alerts into bounded-lifetime overlays. Every alert passes
//! four gates in a fixed order (confidence, suppression, per-category
//! cooldown, rolling seven day budget) before an overlay is created. State
//! lives in [`dashmap`] caches and is written through to the durable store,
//! which stays the system of record: [`AdminOrchestrationService::hydrate`]
//! rebuilds the caches after a restart.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
mod keys;
mod service;
mod stats;

pub use error::{AosError, AosResult};
pub use service::{AdminOrchestrationService, HydrationReport};
pub use stats::{AosStats, GateOutcome};
