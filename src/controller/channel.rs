//! Channel ↔ analyzer attribute mapping.
//!
//! Axis 1 is the integration time requested by the orchestrator. Axes 2.. map,
//! in declared order, onto the configured analyzer attribute names.

use crate::controller::info::MAX_DEVICE;
use crate::error::{CtError, CtResult};
use serde::{Deserialize, Serialize};

/// Axis reserved for the integration time.
pub const TIMER_AXIS: usize = 1;

/// Attribute list as it may appear in configuration: a whitespace separated
/// string or an explicit array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrList {
    /// `"flux sigma"`
    Joined(String),
    /// `["flux", "sigma"]`
    Items(Vec<String>),
}

impl Default for AttrList {
    fn default() -> Self {
        AttrList::Joined(String::new())
    }
}

impl AttrList {
    /// Attribute names in declared order.
    pub fn names(&self) -> Vec<String> {
        match self {
            AttrList::Joined(s) => s.split_whitespace().map(str::to_string).collect(),
            AttrList::Items(items) => items
                .iter()
                .flat_map(|item| item.split_whitespace())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Where an axis reads its value from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelSource<'a> {
    /// Integration time of the current cycle
    IntegrationTime,
    /// Analyzer attribute at `index` in the attribute list
    Attribute {
        /// Position in the attribute list
        index: usize,
        /// Attribute name
        name: &'a str,
    },
}

/// Ordered attribute names backing axes 2 and above.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelMap {
    attributes: Vec<String>,
}

impl ChannelMap {
    /// Build from an attribute list.
    pub fn new(list: &AttrList) -> Self {
        Self {
            attributes: list.names(),
        }
    }

    /// Parse a whitespace separated attribute string.
    pub fn parse(attr_list: &str) -> Self {
        Self::new(&AttrList::Joined(attr_list.to_string()))
    }

    /// Configured attribute names.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Highest axis this map can serve.
    pub fn max_axis(&self) -> usize {
        (self.attributes.len() + TIMER_AXIS).min(MAX_DEVICE)
    }

    /// Reject axes that cannot be served.
    pub fn validate(&self, axis: usize) -> CtResult<()> {
        if axis < TIMER_AXIS || axis > self.max_axis() {
            return Err(CtError::ChannelOutOfRange {
                axis,
                max: self.max_axis(),
            });
        }
        Ok(())
    }

    /// Resolve an axis.
    pub fn source(&self, axis: usize) -> CtResult<ChannelSource<'_>> {
        self.validate(axis)?;
        if axis == TIMER_AXIS {
            return Ok(ChannelSource::IntegrationTime);
        }
        let index = axis - 2;
        Ok(ChannelSource::Attribute {
            index,
            name: &self.attributes[index],
        })
    }

    /// Attribute name at list position `index`.
    pub fn attribute(&self, index: usize) -> Option<&str> {
        self.attributes.get(index).map(String::as_str)
    }
}
