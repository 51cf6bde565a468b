//! Mock Device Implementations
//!
//! Simulated devices for exercising the coordinator without hardware.
//!
//! # Available Mocks
//!
//! - `MockDevice` - Attribute/property store with a run-state, per-command
//!   effects, failure injection and a call log
//! - `MockRegistry` - `DeviceConnector` resolving names to registered mocks
//!
//! A `MockDevice` is a cheap handle around shared state: clone it before
//! registering and keep the clone to drive the device from a test while the
//! coordinator owns the connected handle.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    AttrValue, AttributeReading, DeviceAdapter, DeviceConnector, DeviceState, PropertyMap,
    ATTR_EXPOSURE_TIME, ATTR_IMAGE_COUNTER, ATTR_TRIGGER_MODE, CMD_INIT, CMD_SNAP, CMD_START,
    CMD_STOP, PROP_IMAGE_DEVICE, PROP_MODE,
};
use crate::error::{DeviceError, DeviceResult};

/// What a command does to the simulated device.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandEffect {
    /// Switch run-state
    SetState(DeviceState),
    /// Complete one frame: `ImageCounter += 1`
    IncrementCounter,
}

/// One recorded request against a mock.
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    /// `read_attribute(name)`
    ReadAttribute(String),
    /// `read_attributes(names)`
    ReadAttributes(Vec<String>),
    /// `write_attribute(name, value)`
    WriteAttribute(String, AttrValue),
    /// `state()`
    State,
    /// `command(name)`
    Command(String),
    /// `get_property(name)`
    GetProperty(String),
    /// `put_property(name, values)`
    PutProperty(String, Vec<String>),
}

#[derive(Default)]
struct MockInner {
    state: Option<DeviceState>,
    // lower-cased name -> (device spelling, value)
    attributes: HashMap<String, (String, AttrValue)>,
    properties: PropertyMap,
    effects: HashMap<String, Vec<CommandEffect>>,
    failure: Option<DeviceError>,
    rejected_commands: HashSet<String>,
    calls: Vec<MockCall>,
}

impl MockInner {
    fn check(&self) -> DeviceResult<()> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn counter(&self) -> i64 {
        self.attributes
            .get(&ATTR_IMAGE_COUNTER.to_lowercase())
            .and_then(|(_, v)| v.as_counter())
            .unwrap_or(0)
    }

    fn set_attribute(&mut self, name: &str, value: AttrValue) {
        let key = name.to_lowercase();
        let spelling = self
            .attributes
            .get(&key)
            .map(|(s, _)| s.clone())
            .unwrap_or_else(|| name.to_string());
        self.attributes.insert(key, (spelling, value));
    }
}

/// Simulated device with shared, inspectable state.
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    inner: Arc<Mutex<MockInner>>,
}

impl MockDevice {
    /// Create an idle device with no attributes, properties or command effects.
    pub fn new(name: impl Into<String>) -> Self {
        let inner = MockInner {
            state: Some(DeviceState::Idle),
            ..Default::default()
        };
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Analyzer already running in event mode and paired with `image_device`.
    pub fn analyzer(name: impl Into<String>, image_device: &str) -> Self {
        Self::new(name)
            .with_state(DeviceState::Running)
            .with_attribute(ATTR_IMAGE_COUNTER, 0i64)
            .with_property(PROP_IMAGE_DEVICE, &[image_device])
            .with_property(PROP_MODE, &["EVENT"])
            .with_effect(CMD_START, CommandEffect::SetState(DeviceState::Running))
            .with_effect(CMD_STOP, CommandEffect::SetState(DeviceState::Idle))
            .with_effect(CMD_INIT, CommandEffect::SetState(DeviceState::Running))
    }

    /// Imaging device opened and waiting for `Snap`.
    pub fn imaging(name: impl Into<String>) -> Self {
        Self::new(name)
            .with_state(DeviceState::Open)
            .with_attribute(ATTR_IMAGE_COUNTER, 0i64)
            .with_attribute(ATTR_EXPOSURE_TIME, 100.0)
            .with_attribute(ATTR_TRIGGER_MODE, 1i64)
            .with_effect(CMD_SNAP, CommandEffect::IncrementCounter)
            .with_effect(CMD_START, CommandEffect::SetState(DeviceState::Running))
            .with_effect(CMD_STOP, CommandEffect::SetState(DeviceState::Open))
    }

    /// Builder: initial run-state.
    pub fn with_state(self, state: DeviceState) -> Self {
        self.set_state(state);
        self
    }

    /// Builder: initial attribute value.
    pub fn with_attribute(self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: initial property value list.
    pub fn with_property(self, name: &str, values: &[&str]) -> Self {
        self.set_property(name, values);
        self
    }

    /// Builder: append an effect to command `name`.
    pub fn with_effect(self, name: &str, effect: CommandEffect) -> Self {
        self.lock()
            .effects
            .entry(name.to_lowercase())
            .or_default()
            .push(effect);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: MockCall) -> MutexGuard<'_, MockInner> {
        let mut inner = self.lock();
        inner.calls.push(call);
        inner
    }

    /// Force the run-state.
    pub fn set_state(&self, state: DeviceState) {
        self.lock().state = Some(state);
    }

    /// Current run-state without recording a call.
    pub fn current_state(&self) -> Option<DeviceState> {
        self.lock().state
    }

    /// Set an attribute; the first spelling used for a name is kept.
    pub fn set_attribute(&self, name: &str, value: impl Into<AttrValue>) {
        self.lock().set_attribute(name, value.into());
    }

    /// Remove an attribute so reads of it are rejected.
    pub fn remove_attribute(&self, name: &str) {
        self.lock().attributes.remove(&name.to_lowercase());
    }

    /// Current value of an attribute without recording a call.
    pub fn attribute(&self, name: &str) -> Option<AttrValue> {
        self.lock()
            .attributes
            .get(&name.to_lowercase())
            .map(|(_, v)| v.clone())
    }

    /// Set a property value list.
    pub fn set_property(&self, name: &str, values: &[&str]) {
        self.lock().properties.insert(
            name.to_string(),
            values.iter().map(|v| (*v).to_string()).collect(),
        );
    }

    /// Current `ImageCounter` value (0 when absent).
    pub fn counter(&self) -> i64 {
        self.lock().counter()
    }

    /// Advance `ImageCounter` by one, as if a frame completed.
    pub fn advance_counter(&self) -> i64 {
        let mut inner = self.lock();
        let next = inner.counter() + 1;
        inner.set_attribute(ATTR_IMAGE_COUNTER, AttrValue::Int(next));
        next
    }

    /// Publish processed results and advance `ImageCounter` in one step.
    pub fn complete_frame(&self, results: &[(&str, AttrValue)]) -> i64 {
        let mut inner = self.lock();
        for (name, value) in results {
            inner.set_attribute(name, value.clone());
        }
        let next = inner.counter() + 1;
        inner.set_attribute(ATTR_IMAGE_COUNTER, AttrValue::Int(next));
        next
    }

    /// Make every subsequent request fail with `err` (`None` restores service).
    pub fn fail_with(&self, err: Option<DeviceError>) {
        self.lock().failure = err;
    }

    /// Make the device unreachable.
    pub fn disconnect(&self) {
        let err = DeviceError::unavailable(&self.name, "connection lost");
        self.fail_with(Some(err));
    }

    /// Reject command `name` from now on.
    pub fn reject_command(&self, name: &str) {
        self.lock().rejected_commands.insert(name.to_lowercase());
    }

    /// Every request recorded so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Names of commands issued so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Command(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded requests.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl DeviceAdapter for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_attribute(&self, name: &str) -> DeviceResult<AttrValue> {
        let inner = self.record(MockCall::ReadAttribute(name.to_string()));
        inner.check()?;
        inner
            .attributes
            .get(&name.to_lowercase())
            .map(|(_, v)| v.clone())
            .ok_or_else(|| DeviceError::rejected(&self.name, format!("no attribute '{}'", name)))
    }

    fn read_attributes(&self, names: &[&str]) -> DeviceResult<Vec<AttributeReading>> {
        let call = MockCall::ReadAttributes(names.iter().map(|n| (*n).to_string()).collect());
        let inner = self.record(call);
        inner.check()?;
        names
            .iter()
            .map(|name| {
                inner
                    .attributes
                    .get(&name.to_lowercase())
                    .map(|(spelling, value)| AttributeReading {
                        name: spelling.clone(),
                        value: value.clone(),
                    })
                    .ok_or_else(|| {
                        DeviceError::rejected(&self.name, format!("no attribute '{}'", name))
                    })
            })
            .collect()
    }

    fn write_attribute(&self, name: &str, value: AttrValue) -> DeviceResult<()> {
        let mut inner = self.record(MockCall::WriteAttribute(name.to_string(), value.clone()));
        inner.check()?;
        inner.set_attribute(name, value);
        Ok(())
    }

    fn state(&self) -> DeviceResult<DeviceState> {
        let inner = self.record(MockCall::State);
        inner.check()?;
        inner
            .state
            .ok_or_else(|| DeviceError::unavailable(&self.name, "state unknown"))
    }

    fn command(&self, name: &str) -> DeviceResult<()> {
        let mut inner = self.record(MockCall::Command(name.to_string()));
        inner.check()?;
        let key = name.to_lowercase();
        if inner.rejected_commands.contains(&key) {
            return Err(DeviceError::rejected(
                &self.name,
                format!("command '{}' not allowed", name),
            ));
        }
        let effects = inner.effects.get(&key).cloned().unwrap_or_default();
        for effect in effects {
            match effect {
                CommandEffect::SetState(state) => inner.state = Some(state),
                CommandEffect::IncrementCounter => {
                    let next = inner.counter() + 1;
                    inner.set_attribute(ATTR_IMAGE_COUNTER, AttrValue::Int(next));
                }
            }
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> DeviceResult<PropertyMap> {
        let inner = self.record(MockCall::GetProperty(name.to_string()));
        inner.check()?;
        let mut props = PropertyMap::new();
        if let Some(values) = inner.properties.get(name) {
            props.insert(name.to_string(), values.clone());
        }
        Ok(props)
    }

    fn put_property(&self, name: &str, values: Vec<String>) -> DeviceResult<()> {
        let mut inner = self.record(MockCall::PutProperty(name.to_string(), values.clone()));
        inner.check()?;
        inner.properties.insert(name.to_string(), values);
        Ok(())
    }
}

/// Name → mock lookup standing in for the device database.
#[derive(Clone, Default)]
pub struct MockRegistry {
    devices: HashMap<String, MockDevice>,
}

impl MockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a running analyzer paired with an open imaging device.
    ///
    /// Returns the registry plus handles to both devices.
    pub fn paired(analyzer_name: &str, imaging_name: &str) -> (Self, MockDevice, MockDevice) {
        let analyzer = MockDevice::analyzer(analyzer_name, imaging_name);
        let imaging = MockDevice::imaging(imaging_name);
        let mut registry = Self::new();
        registry.register(analyzer.clone());
        registry.register(imaging.clone());
        (registry, analyzer, imaging)
    }

    /// Register a device under its own name, replacing any previous entry.
    pub fn register(&mut self, device: MockDevice) {
        self.devices.insert(device.name.to_lowercase(), device);
    }
}

impl DeviceConnector for MockRegistry {
    fn connect(&self, name: &str) -> DeviceResult<Box<dyn DeviceAdapter>> {
        self.devices
            .get(&name.to_lowercase())
            .map(|device| Box::new(device.clone()) as Box<dyn DeviceAdapter>)
            .ok_or_else(|| DeviceError::unavailable(name, "device not defined in database"))
    }
}
