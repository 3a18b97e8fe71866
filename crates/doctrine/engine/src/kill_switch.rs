//! Runtime kill switches.

use crate::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Component that can be switched off at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillSwitch {
    /// Background pattern detection.
    Pde,
    /// Overlay emission.
    Overlays,
    /// Domain classification; while off every text resolves to `general`.
    Classifier,
}

impl KillSwitch {
    pub const ALL: [KillSwitch; 3] = [KillSwitch::Pde, KillSwitch::Overlays, KillSwitch::Classifier];

    pub fn as_str(&self) -> &'static str {
        match self {
            KillSwitch::Pde => "pde",
            KillSwitch::Overlays => "overlays",
            KillSwitch::Classifier => "classifier",
        }
    }
}

impl fmt::Display for KillSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KillSwitch {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        KillSwitch::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EngineError::UnknownKillSwitch(s.to_string()))
    }
}

/// Snapshot of every switch; `true` means the component runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitchState {
    pub pde: bool,
    pub overlays: bool,
    pub classifier: bool,
}

/// Kill switches shared between the facade and the scanner.
#[derive(Debug)]
pub struct KillSwitches {
    pde: AtomicBool,
    overlays: AtomicBool,
    classifier: AtomicBool,
}

impl Default for KillSwitches {
    fn default() -> Self {
        Self {
            pde: AtomicBool::new(true),
            overlays: AtomicBool::new(true),
            classifier: AtomicBool::new(true),
        }
    }
}

impl KillSwitches {
    fn flag(&self, switch: KillSwitch) -> &AtomicBool {
        match switch {
            KillSwitch::Pde => &self.pde,
            KillSwitch::Overlays => &self.overlays,
            KillSwitch::Classifier => &self.classifier,
        }
    }

    pub fn is_enabled(&self, switch: KillSwitch) -> bool {
        self.flag(switch).load(Ordering::SeqCst)
    }

    /// Returns the previous value.
    pub fn set(&self, switch: KillSwitch, enabled: bool) -> bool {
        self.flag(switch).swap(enabled, Ordering::SeqCst)
    }

    pub fn state(&self) -> KillSwitchState {
        KillSwitchState {
            pde: self.is_enabled(KillSwitch::Pde),
            overlays: self.is_enabled(KillSwitch::Overlays),
            classifier: self.is_enabled(KillSwitch::Classifier),
        }
    }
}
