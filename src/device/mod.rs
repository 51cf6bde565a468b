//! Device Adapter layer
//!
//! A thin, synchronous request/response facade over a hardware device. The
//! coordinator never talks to hardware any other way: it reads and writes
//! named attributes, queries run-state, issues named commands and inspects
//! device properties.
//!
//! # Contract
//!
//! - Every call blocks until the device answered.
//! - Every call may fail with [`DeviceError::Unavailable`] (device unreachable)
//!   or [`DeviceError::Rejected`] (device answered with a refusal).
//! - Adapters hold no acquisition state of their own.
//!
//! Handles are obtained once through a [`DeviceConnector`] and owned by the
//! caller afterwards; nothing is resolved again per call.
//!
//! [`DeviceError::Unavailable`]: crate::error::DeviceError::Unavailable
//! [`DeviceError::Rejected`]: crate::error::DeviceError::Rejected

pub mod mock;

use crate::error::DeviceResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub use mock::{CommandEffect, MockDevice, MockRegistry};

/// Attribute incremented once per completed frame (both devices).
pub const ATTR_IMAGE_COUNTER: &str = "ImageCounter";
/// Imaging device exposure time, in milliseconds.
pub const ATTR_EXPOSURE_TIME: &str = "ExposureTime";
/// Imaging device trigger mode; `0` is single shot.
pub const ATTR_TRIGGER_MODE: &str = "TriggerMode";

/// Analyzer property naming its paired imaging device.
pub const PROP_IMAGE_DEVICE: &str = "ImageDevice";
/// Analyzer property selecting its processing mode.
pub const PROP_MODE: &str = "Mode";

/// Start acquiring (analyzer) or streaming (imaging device).
pub const CMD_START: &str = "Start";
/// Stop acquiring.
pub const CMD_STOP: &str = "Stop";
/// Capture a single frame.
pub const CMD_SNAP: &str = "Snap";
/// Reinitialize the device, re-reading its properties.
pub const CMD_INIT: &str = "Init";

/// Run-state vocabulary reported by a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    /// Powered and idle, not acquiring
    Idle,
    /// Imaging device opened and waiting for a capture command
    Open,
    /// Acquiring or processing continuously
    Running,
    /// Device reports an internal fault
    Fault,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceState::Idle => "IDLE",
            DeviceState::Open => "OPEN",
            DeviceState::Running => "RUNNING",
            DeviceState::Fault => "FAULT",
        };
        f.write_str(s)
    }
}

/// Value carried by a device attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean
    Bool(bool),
    /// Integer, including frame counters
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    String(String),
    /// Spectrum or profile
    FloatArray(Vec<f64>),
    /// No value
    Null,
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(fl) => write!(f, "{}", fl),
            AttrValue::String(s) => write!(f, "{}", s),
            AttrValue::FloatArray(arr) => write!(f, "{:?}", arr),
            AttrValue::Null => write!(f, "null"),
        }
    }
}

impl AttrValue {
    /// Extract value as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Extract value as a frame counter
    pub fn as_counter(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            AttrValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(value: Vec<f64>) -> Self {
        AttrValue::FloatArray(value)
    }
}

/// One attribute returned by a batched read. `name` is spelled the way the
/// device spells it, which is not necessarily the way it was requested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeReading {
    /// Attribute name as spelled by the device
    pub name: String,
    /// Value read
    pub value: AttrValue,
}

/// Property lookup result: property name to its list of string values.
pub type PropertyMap = HashMap<String, Vec<String>>;

/// Synchronous request/response facade over one physical device.
///
/// # Thread Safety
/// - Methods take `&self`; implementations use interior mutability
/// - `Send` so a coordinator owning boxed handles can move between threads
pub trait DeviceAdapter: Send {
    /// Identifier the handle was resolved from.
    fn name(&self) -> &str;

    /// Read a single named attribute.
    fn read_attribute(&self, name: &str) -> DeviceResult<AttrValue>;

    /// Read several attributes in one request.
    ///
    /// The default implementation issues one `read_attribute` per name;
    /// adapters for devices with a native batched read should override it.
    fn read_attributes(&self, names: &[&str]) -> DeviceResult<Vec<AttributeReading>> {
        names
            .iter()
            .map(|name| {
                Ok(AttributeReading {
                    name: (*name).to_string(),
                    value: self.read_attribute(name)?,
                })
            })
            .collect()
    }

    /// Write a single named attribute.
    fn write_attribute(&self, name: &str, value: AttrValue) -> DeviceResult<()>;

    /// Query live run-state.
    fn state(&self) -> DeviceResult<DeviceState>;

    /// Issue a named command (`Start`, `Stop`, `Snap`, `Init`, ...).
    fn command(&self, name: &str) -> DeviceResult<()>;

    /// Read a device property.
    fn get_property(&self, name: &str) -> DeviceResult<PropertyMap>;

    /// Overwrite a device property. Takes effect after the device is reinitialized.
    fn put_property(&self, name: &str, values: Vec<String>) -> DeviceResult<()>;
}

/// Resolves a device identifier into an owned handle.
pub trait DeviceConnector {
    /// Connect to the device named `name`.
    fn connect(&self, name: &str) -> DeviceResult<Box<dyn DeviceAdapter>>;
}

/// First value of property `name` in `props`, if any.
pub fn first_property_value<'a>(props: &'a PropertyMap, name: &str) -> Option<&'a str> {
    props
        .get(name)
        .and_then(|values| values.first())
        .map(String::as_str)
}
