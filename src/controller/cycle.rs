//! Per-cycle acquisition state.
//!
//! A [`CycleState`] is rebuilt from scratch on every configure-cycle call, so
//! nothing read or armed for one acquisition can leak into the next.

use crate::device::{AttrValue, AttributeReading};
use crate::error::{CtError, CtResult};
use std::collections::{BTreeSet, HashMap};

/// Frame-completion counters snapshotted when the cycle was armed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Baseline {
    /// Analyzer `ImageCounter`
    pub analyzer: i64,
    /// Imaging device `ImageCounter`
    pub imaging: i64,
}

#[derive(Clone, Debug, PartialEq)]
enum Slot {
    Queued,
    Fetched(AttrValue),
}

/// Attribute values for the current cycle, keyed by lower-cased name.
///
/// A name is either absent (never requested), queued (requested but the bulk
/// read has not returned it) or fetched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeCache {
    slots: HashMap<String, Slot>,
}

fn canonical(name: &str) -> String {
    name.to_lowercase()
}

impl AttributeCache {
    /// Replace the whole cache with the outcome of one bulk read.
    ///
    /// Every requested name ends up at least queued; those the device
    /// returned are fetched.
    pub fn replace(&mut self, requested: &[String], readings: Vec<AttributeReading>) {
        self.slots = requested
            .iter()
            .map(|name| (canonical(name), Slot::Queued))
            .collect();
        for reading in readings {
            self.slots
                .insert(canonical(&reading.name), Slot::Fetched(reading.value));
        }
    }

    /// Value fetched for `name` in this cycle.
    pub fn get(&self, name: &str) -> CtResult<&AttrValue> {
        match self.slots.get(&canonical(name)) {
            Some(Slot::Fetched(value)) => Ok(value),
            Some(Slot::Queued) => Err(CtError::AttributeNotFetched(name.to_string())),
            None => Err(CtError::AttributeNotQueued(name.to_string())),
        }
    }

    /// `name` has a value for this cycle.
    pub fn is_fetched(&self, name: &str) -> bool {
        matches!(self.slots.get(&canonical(name)), Some(Slot::Fetched(_)))
    }

    /// Nothing queued or fetched.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Everything that belongs to one configure → arm → start → read sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleState {
    /// Requested integration time in seconds (`None` before the first configure)
    pub integration_time: Option<f64>,
    /// Requested repetitions
    pub repetitions: u64,
    /// Latency hint in seconds; stored, unused
    pub latency_time: f64,
    /// Counters recorded by the last successful arm
    pub baseline: Option<Baseline>,
    /// Acquisition fired for this cycle
    pub started: bool,
    /// Set by abort; not consulted by the state machine
    pub aborted: bool,
    pending: BTreeSet<usize>,
    pub(crate) cache: AttributeCache,
}

impl CycleState {
    /// Fresh cycle for the given load parameters.
    pub fn new(integration_time: f64, repetitions: u64, latency_time: f64) -> Self {
        Self {
            integration_time: Some(integration_time),
            repetitions,
            latency_time,
            ..Default::default()
        }
    }

    /// Queue attribute list position `index` for the next bulk read.
    pub fn queue(&mut self, index: usize) {
        self.pending.insert(index);
    }

    /// Attribute list positions waiting for the next bulk read, ascending.
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().copied()
    }

    /// Drain the pending set.
    pub fn take_pending(&mut self) -> BTreeSet<usize> {
        std::mem::take(&mut self.pending)
    }

    /// Values fetched by the last bulk read.
    pub fn cache(&self) -> &AttributeCache {
        &self.cache
    }
}
