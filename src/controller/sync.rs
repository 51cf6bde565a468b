//! Acquisition synchronization modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trigger discipline selected by the orchestrator for a cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcqSynch {
    /// One software trigger per acquisition
    #[default]
    SoftwareTrigger,
    /// Software gate: acquisition lasts for the integration time
    SoftwareGate,
    /// Software start followed by a timed train
    SoftwareStart,
    /// External hardware trigger per acquisition
    HardwareTrigger,
    /// External hardware gate
    HardwareGate,
    /// External hardware start
    HardwareStart,
}

impl AcqSynch {
    /// Modes this controller can drive: the imaging device is always fired
    /// with a software `Snap`.
    pub fn is_supported(self) -> bool {
        matches!(self, AcqSynch::SoftwareTrigger | AcqSynch::SoftwareGate)
    }
}

impl fmt::Display for AcqSynch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AcqSynch::SoftwareTrigger => "SoftwareTrigger",
            AcqSynch::SoftwareGate => "SoftwareGate",
            AcqSynch::SoftwareStart => "SoftwareStart",
            AcqSynch::HardwareTrigger => "HardwareTrigger",
            AcqSynch::HardwareGate => "HardwareGate",
            AcqSynch::HardwareStart => "HardwareStart",
        };
        f.write_str(s)
    }
}
