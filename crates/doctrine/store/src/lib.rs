//! Durable store contract for doctrine governance state.
//!
//! The governance components persist overlays, budget ledgers, cooldowns,
//! suppression flags and bundle overrides through [`DurableStore`]. Callers
//! never talk to a backend directly: they hold a [`BestEffortStore`], which
//! applies the same swallow-and-log policy to every operation so that a
//! store outage degrades the engine to in-memory operation instead of
//! surfacing errors.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod best_effort;
mod error;
pub mod memory;
mod traits;

pub use best_effort::BestEffortStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::DurableStore;
