//! # doctrine-classifier
//!
//! Deterministic, rule-based routing of free text into a policy [`Domain`],
//! followed by the pure mapping from that domain to an
//! [`EnforcementMode`] and its constraint preset.
//!
//! Classification performs no I/O. Input is capped at
//! [`MAX_INPUT_BYTES`] and matched with the `regex` crate, whose automata
//! run in time linear in the input, so every call finishes within a fixed
//! bound.
//!
//! [`Domain`]: doctrine_types::Domain
//! [`EnforcementMode`]: doctrine_types::EnforcementMode

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod classifier;
mod error;
mod patterns;
mod resolver;

pub use classifier::{ClassifierStats, DomainClassifier, RouteEntry, MAX_INPUT_BYTES};
pub use error::{ClassifierError, ClassifierResult};
pub use patterns::default_patterns;
pub use resolver::ModeResolver;
