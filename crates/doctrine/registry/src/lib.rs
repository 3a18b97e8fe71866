//! # doctrine-registry
//!
//! Loads versioned rule bundles ("playbooks"), checks their provenance and
//! compares every bundle's stamped content hash with a hash recomputed from
//! the live canonical rule source.
//!
//! ## Safe mode
//!
//! A single mismatching bundle puts the *whole* registry into safe mode:
//! no rule content is served for any domain until the bundles are
//! regenerated from the canonical source and reloaded. Classification and
//! mode resolution are unaffected.
//!
//! ## Canonical encoding
//!
//! See [`RuleSourceSnapshot::canonical_hash`]. The encoding is fixed and
//! must be reproduced exactly by any other producer of bundle hashes.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
mod overrides;
mod playbook;
mod registry;
mod source;
mod terms;

pub use error::{RegistryError, RegistryResult};
pub use overrides::{BundleField, BundleOverride};
pub use playbook::{BundleFormat, Playbook, PlaybookFile, TermEntry, CANONICAL_SOURCE_TAG};
pub use registry::{BundleDiff, LoadReport, PlaybookRegistry, RegenerateReport, RegistryState};
pub use source::{CanonicalRuleSource, FileRuleSource, RuleSourceSnapshot, StaticRuleSource};
pub use terms::TermWarning;
