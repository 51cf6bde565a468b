//! Acquisition state evaluation.
//!
//! There is no stored transition table: the state is recomputed on every query
//! from the analyzer's live run-state and frame counter against the baseline
//! recorded at arm time.
//!
//! Completion is inferred from "analyzer counter advanced past its baseline",
//! i.e. the cycle stays `Busy` while `counter <= baseline`. That is an
//! approximation. A counter that wraps around below its baseline keeps the
//! cycle `Busy` until it climbs past the baseline again, and a counter that
//! advances before the derived values are published is read as completion.
//!
//! A cycle that was started without an armed baseline has nothing to compare
//! against and is reported as `Fault`.

use crate::controller::cycle::Baseline;
use crate::device::DeviceState;
use serde::Serialize;
use std::fmt;

/// Status text reported before the first state query.
pub const STATUS_INITIAL: &str = "Status ON";
/// Status text while no cycle is pending.
pub const STATUS_READY: &str = "Device ready to acquire";
/// Status text while the analyzer has not produced the cycle's result.
pub const STATUS_BUSY: &str = "Device is acquiring/processing";

/// Controller state as seen by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CtState {
    /// Idle, or the last cycle produced a fresh processed result
    Ready,
    /// Cycle started and the analyzer has not produced a new result yet
    Busy,
    /// Analyzer not running or unreachable, or a cycle started unarmed
    Fault,
}

impl fmt::Display for CtState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CtState::Ready => "Ready",
            CtState::Busy => "Busy",
            CtState::Fault => "Fault",
        };
        f.write_str(s)
    }
}

/// State plus human readable status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StateReport {
    /// Computed state
    pub state: CtState,
    /// Status text shown to the operator
    pub status: String,
}

impl StateReport {
    /// Create a report from a state and its status text.
    pub fn new(state: CtState, status: impl Into<String>) -> Self {
        Self {
            state,
            status: status.into(),
        }
    }

    /// Report held before any query.
    pub fn initial() -> Self {
        Self::new(CtState::Ready, STATUS_INITIAL)
    }

    /// Fault naming the analyzer and what it reported instead of running.
    pub fn not_running(device: &str, reported: impl fmt::Display) -> Self {
        Self::new(
            CtState::Fault,
            format!("{} is not Running, is in {}", device, reported),
        )
    }

    /// Fault for a cycle started with no baseline to compare against.
    pub fn unarmed(device: &str) -> Self {
        Self::new(
            CtState::Fault,
            format!("{} started without an armed baseline", device),
        )
    }

    /// The last cycle, if any, is complete.
    pub fn is_ready(&self) -> bool {
        self.state == CtState::Ready
    }
}

/// True while the analyzer has not advanced past the armed baseline.
pub fn awaiting_analyzer(started: bool, baseline: Option<Baseline>, analyzer_counter: i64) -> bool {
    match baseline {
        Some(baseline) => started && analyzer_counter <= baseline.analyzer,
        None => false,
    }
}

/// Evaluate the controller state.
///
/// `analyzer_counter` is only consulted when the analyzer is running.
pub fn evaluate(
    device: &str,
    analyzer_state: DeviceState,
    analyzer_counter: i64,
    started: bool,
    baseline: Option<Baseline>,
) -> StateReport {
    if analyzer_state != DeviceState::Running {
        StateReport::not_running(device, analyzer_state)
    } else if started && baseline.is_none() {
        StateReport::unarmed(device)
    } else if awaiting_analyzer(started, baseline, analyzer_counter) {
        StateReport::new(CtState::Busy, STATUS_BUSY)
    } else {
        StateReport::new(CtState::Ready, STATUS_READY)
    }
}
