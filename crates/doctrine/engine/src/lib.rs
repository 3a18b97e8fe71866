//! Doctrine governance engine.
//!
//! This crate assembles the governance components into one engine:
//! - [`GovernanceEngine`]: runtime evaluation and the administrative facade
//! - [`ScanScheduler`]: the background pattern scanner
//! - [`KillSwitches`] and the [`AuditLog`] of administrative actions
//! - [`DoctrineConfig`]: layered configuration for the `doctrined` daemon

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod audit;
pub mod config;
mod engine;
mod error;
pub mod kill_switch;
pub mod scheduler;

pub use audit::{AuditAction, AuditEntry, AuditLog, AuditOutcome, AUDIT_LOG_CAPACITY};
pub use config::DoctrineConfig;
pub use engine::{
    EngineHealth, GovernanceDecision, GovernanceEngine, RegistryHealth, StartupReport, StoreHealth,
};
pub use error::{EngineError, EngineResult};
pub use kill_switch::{KillSwitch, KillSwitchState, KillSwitches};
pub use scheduler::{CycleReport, ScanScheduler, SchedulerStats, TickOutcome};
