//! Acquisition Coordinator
//!
//! Presents an analyzer device and its paired imaging device to the host
//! orchestrator as one counter/timer controller. Axis 1 reports the requested
//! integration time; axes 2.. report analyzer attributes computed from the
//! frame captured during the cycle.
//!
//! # Lifecycle
//!
//! The orchestrator drives every step; nothing runs in the background:
//!
//! ```text
//! add_device(axis)*                       once per channel
//! load_one(..)                            resets all cycle state
//! pre_start_one(axis)*                    arm + baseline counters
//! start_all()                             imaging device Snap
//! state_all() .. until Ready              poll loop owned by the orchestrator
//! pre_read_one(axis)* , read_all()        one batched analyzer read
//! read_one(axis)*
//! ```
//!
//! Completion is never signalled by either device. The cycle is done once the
//! analyzer's `ImageCounter` moves past the value recorded at arm time.
//!
//! # Concurrency
//!
//! Single caller, one cycle at a time. Starting a new cycle before the previous
//! one reached `Ready` overwrites the baseline mid-flight. No timeout is applied
//! here: if the analyzer never advances, the state stays `Busy`.

pub mod channel;
pub mod cycle;
pub mod info;
pub mod state;
pub mod sync;

use crate::config::ControllerConfig;
use crate::device::{
    first_property_value, AttrValue, DeviceAdapter, DeviceConnector, DeviceState,
    ATTR_EXPOSURE_TIME, ATTR_IMAGE_COUNTER, ATTR_TRIGGER_MODE, CMD_INIT, CMD_SNAP, CMD_START,
    CMD_STOP, PROP_IMAGE_DEVICE, PROP_MODE,
};
use crate::error::{CtError, CtResult, DeviceError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub use channel::{AttrList, ChannelMap, ChannelSource, TIMER_AXIS};
pub use cycle::{AttributeCache, Baseline, CycleState};
pub use info::{ControllerInfo, CONTROLLER_INFO, MAX_DEVICE};
pub use state::{CtState, StateReport};
pub use sync::AcqSynch;

/// Analyzer processing mode required for frame-driven operation.
pub const EVENT_MODE: &str = "EVENT";
/// Imaging device exposure unit is milliseconds.
pub const EXPOSURE_SCALE: f64 = 1000.0;
/// `TriggerMode` value selecting single-shot acquisition.
pub const TRIGGER_MODE_SINGLE: i64 = 0;

/// Counter/timer lifecycle as called by the host orchestrator.
///
/// # Contract
/// - `load_one` is the only reset point for per-cycle state
/// - `pre_start_one` reports failure as `false`, never as an error
/// - `state_all` never fails: unreachable devices surface as `Fault`
/// - `read_all` / `read_one` are no-ops unless the last `state_all` was `Ready`
pub trait CounterTimerController {
    /// Register channel `axis`.
    fn add_device(&mut self, axis: usize) -> CtResult<()>;

    /// Unregister channel `axis`.
    fn delete_device(&mut self, axis: usize);

    /// Recompute the controller state from live device state.
    fn state_all(&mut self) -> &StateReport;

    /// State of one channel as computed by the last `state_all`.
    fn state_one(&self, axis: usize) -> StateReport;

    /// Configure the next cycle.
    fn load_one(
        &mut self,
        axis: usize,
        value: f64,
        repetitions: u64,
        latency_time: f64,
    ) -> CtResult<()>;

    /// Arm the devices for channel `axis`.
    fn pre_start_one(&mut self, axis: usize) -> bool;

    /// Fire the acquisition. Does not wait for completion.
    fn start_all(&mut self) -> CtResult<()>;

    /// Best-effort stop of the running acquisition.
    fn abort_one(&mut self, axis: usize) -> CtResult<()>;

    /// Include channel `axis` in the next `read_all`.
    fn pre_read_one(&mut self, axis: usize) -> CtResult<()>;

    /// Fetch every queued channel from the analyzer in one request.
    fn read_all(&mut self) -> CtResult<()>;

    /// Value of channel `axis` for the current cycle.
    fn read_one(&self, axis: usize) -> CtResult<Option<AttrValue>>;
}

/// Counter/timer controller for an image beam analyzer and its imaging device.
pub struct ImgBeamAnalyzerCtrl {
    dev_name: String,
    analyzer: Option<Box<dyn DeviceAdapter>>,
    imaging: Option<Box<dyn DeviceAdapter>>,
    channels: ChannelMap,
    synchronization: AcqSynch,
    cycle: CycleState,
    report: StateReport,
    abort_clears_started: bool,
    setup_error: Option<String>,
}

impl ImgBeamAnalyzerCtrl {
    /// Create the controller and resolve both devices.
    ///
    /// Setup failures are logged and leave the controller degraded instead of
    /// failing construction; check [`is_connected`](Self::is_connected) or
    /// [`setup_error`](Self::setup_error) before relying on it.
    pub fn new(config: &ControllerConfig, connector: &dyn DeviceConnector) -> Self {
        let mut ctrl = Self {
            dev_name: config.dev_name.clone(),
            analyzer: None,
            imaging: None,
            channels: ChannelMap::new(&config.attr_list),
            synchronization: AcqSynch::default(),
            cycle: CycleState::default(),
            report: StateReport::initial(),
            abort_clears_started: config.abort_clears_started,
            setup_error: None,
        };
        if let Err(err) = ctrl.setup(connector, config.settle_delay()) {
            error!(
                device = %ctrl.dev_name,
                error = %err,
                "{}::new() failed, controller left degraded",
                CONTROLLER_INFO.class_name
            );
            ctrl.setup_error = Some(err.to_string());
        }
        ctrl
    }

    /// Resolve the analyzer, then the imaging device it names, then make sure
    /// the analyzer processes frames as events.
    fn setup(&mut self, connector: &dyn DeviceConnector, settle_delay: Duration) -> CtResult<()> {
        let analyzer = self.analyzer.insert(connector.connect(&self.dev_name)?);

        let props = analyzer.get_property(PROP_IMAGE_DEVICE)?;
        let imaging_name = first_property_value(&props, PROP_IMAGE_DEVICE).ok_or_else(|| {
            CtError::Configuration(format!(
                "{} has no {} property",
                self.dev_name, PROP_IMAGE_DEVICE
            ))
        })?;
        self.imaging = Some(connector.connect(imaging_name)?);
        debug!(analyzer = %self.dev_name, imaging = %imaging_name, "Devices resolved");

        ensure_event_mode(&**analyzer, settle_delay)
    }

    /// Both device handles were resolved.
    pub fn is_connected(&self) -> bool {
        self.analyzer.is_some() && self.imaging.is_some()
    }

    /// Why setup failed, if it did.
    pub fn setup_error(&self) -> Option<&str> {
        self.setup_error.as_deref()
    }

    /// Analyzer device identifier.
    pub fn dev_name(&self) -> &str {
        &self.dev_name
    }

    /// Imaging device identifier, once resolved.
    pub fn imaging_name(&self) -> Option<&str> {
        self.imaging.as_deref().map(|dev| dev.name())
    }

    /// Static controller metadata.
    pub fn info() -> &'static ControllerInfo {
        &CONTROLLER_INFO
    }

    /// Axis to attribute mapping.
    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// Trigger discipline checked by `load_one`.
    pub fn synchronization(&self) -> AcqSynch {
        self.synchronization
    }

    /// Select the trigger discipline checked by the next `load_one`.
    pub fn set_synchronization(&mut self, synchronization: AcqSynch) {
        self.synchronization = synchronization;
    }

    /// Current cycle state.
    pub fn cycle(&self) -> &CycleState {
        &self.cycle
    }

    /// Latency hint passed to the last `load_one`.
    pub fn latency_time(&self) -> f64 {
        self.cycle.latency_time
    }

    fn analyzer(&self) -> CtResult<&dyn DeviceAdapter> {
        self.analyzer
            .as_deref()
            .ok_or(CtError::NotConnected("analyzer"))
    }

    fn imaging(&self) -> CtResult<&dyn DeviceAdapter> {
        self.imaging
            .as_deref()
            .ok_or(CtError::NotConnected("imaging"))
    }

    /// Put both devices in acquisition position and snapshot their counters.
    ///
    /// Counters are only returned once every device call succeeded.
    fn arm(&self) -> CtResult<Baseline> {
        let analyzer = self.analyzer()?;
        let imaging = self.imaging()?;
        let integration_time = self
            .cycle
            .integration_time
            .ok_or_else(|| CtError::Configuration("no integration time loaded".into()))?;

        if analyzer.state()? != DeviceState::Running {
            analyzer.command(CMD_START)?;
        }
        if imaging.state()? != DeviceState::Open {
            imaging.command(CMD_STOP)?;
        }

        imaging.write_attribute(
            ATTR_EXPOSURE_TIME,
            AttrValue::Float(integration_time * EXPOSURE_SCALE),
        )?;
        imaging.write_attribute(ATTR_TRIGGER_MODE, AttrValue::Int(TRIGGER_MODE_SINGLE))?;

        let imaging_counter = read_counter(imaging)?;
        let analyzer_counter = read_counter(analyzer)?;
        Ok(Baseline {
            analyzer: analyzer_counter,
            imaging: imaging_counter,
        })
    }

    fn evaluate_state(&self) -> StateReport {
        let analyzer = match self.analyzer() {
            Ok(analyzer) => analyzer,
            Err(err) => return StateReport::new(CtState::Fault, err.to_string()),
        };
        let analyzer_state = match analyzer.state() {
            Ok(state) => state,
            Err(err) => return unreachable_report(&self.dev_name, err),
        };
        if analyzer_state != DeviceState::Running {
            return StateReport::not_running(&self.dev_name, analyzer_state);
        }

        let counter = if self.cycle.started {
            match read_counter(analyzer) {
                Ok(counter) => counter,
                Err(err) => return unreachable_report(&self.dev_name, err),
            }
        } else {
            0
        };

        let report = state::evaluate(
            &self.dev_name,
            analyzer_state,
            counter,
            self.cycle.started,
            self.cycle.baseline,
        );
        if report.state == CtState::Busy {
            self.log_processing_lag();
        }
        report
    }

    /// Diagnostic only: the imaging device delivered its frame but the
    /// analyzer has not published a result for it yet.
    fn log_processing_lag(&self) {
        let (Some(baseline), Some(imaging)) = (self.cycle.baseline, self.imaging.as_deref()) else {
            return;
        };
        match read_counter(imaging) {
            Ok(counter) if counter > baseline.imaging => {
                info!(
                    imaging = imaging.name(),
                    analyzer = %self.dev_name,
                    "Imaging device finished but analyzer still processing"
                );
            }
            Ok(_) => {}
            Err(err) => debug!(error = %err, "Imaging counter unavailable while busy"),
        }
    }
}

impl CounterTimerController for ImgBeamAnalyzerCtrl {
    fn add_device(&mut self, axis: usize) -> CtResult<()> {
        self.channels.validate(axis)
    }

    fn delete_device(&mut self, _axis: usize) {}

    fn state_all(&mut self) -> &StateReport {
        self.report = self.evaluate_state();
        &self.report
    }

    fn state_one(&self, _axis: usize) -> StateReport {
        self.report.clone()
    }

    fn load_one(
        &mut self,
        axis: usize,
        value: f64,
        repetitions: u64,
        latency_time: f64,
    ) -> CtResult<()> {
        if !self.synchronization.is_supported() {
            return Err(CtError::SynchronizationUnsupported(self.synchronization));
        }
        self.channels.validate(axis)?;
        if !value.is_finite() || value < 0.0 {
            return Err(CtError::Configuration(format!(
                "integration time must be a non-negative number of seconds, got {}",
                value
            )));
        }
        if repetitions == 0 {
            return Err(CtError::Configuration(
                "repetitions must be at least 1".into(),
            ));
        }

        self.cycle = CycleState::new(value, repetitions, latency_time);
        debug!(integration_time = value, repetitions, "Cycle loaded");
        Ok(())
    }

    fn pre_start_one(&mut self, axis: usize) -> bool {
        match self.arm() {
            Ok(baseline) => {
                debug!(
                    axis,
                    analyzer_counter = baseline.analyzer,
                    imaging_counter = baseline.imaging,
                    "Cycle armed"
                );
                self.cycle.baseline = Some(baseline);
                true
            }
            Err(err) => {
                error!(axis, error = %err, "PreStartOne({}) failed", axis);
                false
            }
        }
    }

    fn start_all(&mut self) -> CtResult<()> {
        self.imaging()?.command(CMD_SNAP)?;
        self.cycle.started = true;
        Ok(())
    }

    fn abort_one(&mut self, axis: usize) -> CtResult<()> {
        self.imaging()?.command(CMD_STOP)?;
        self.cycle.aborted = true;
        if self.abort_clears_started {
            self.cycle.started = false;
        }
        debug!(axis, started = self.cycle.started, "Acquisition aborted");
        Ok(())
    }

    fn pre_read_one(&mut self, axis: usize) -> CtResult<()> {
        if let ChannelSource::Attribute { index, .. } = self.channels.source(axis)? {
            self.cycle.queue(index);
        }
        Ok(())
    }

    fn read_all(&mut self) -> CtResult<()> {
        if !self.report.is_ready() {
            return Ok(());
        }
        let pending = self.cycle.take_pending();
        let names: Vec<String> = pending
            .into_iter()
            .filter_map(|index| self.channels.attribute(index).map(str::to_string))
            .collect();

        let readings = if names.is_empty() {
            Vec::new()
        } else {
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            self.analyzer()?.read_attributes(&refs)?
        };
        debug!(attributes = ?names, "Bulk read complete");
        self.cycle.cache.replace(&names, readings);
        Ok(())
    }

    fn read_one(&self, axis: usize) -> CtResult<Option<AttrValue>> {
        if !self.report.is_ready() {
            return Ok(None);
        }
        match self.channels.source(axis)? {
            ChannelSource::IntegrationTime => Ok(self.cycle.integration_time.map(AttrValue::Float)),
            ChannelSource::Attribute { name, .. } => {
                self.cycle.cache().get(name).map(|value| Some(value.clone()))
            }
        }
    }
}

fn read_counter(device: &dyn DeviceAdapter) -> CtResult<i64> {
    let value = device.read_attribute(ATTR_IMAGE_COUNTER)?;
    value.as_counter().ok_or_else(|| {
        DeviceError::rejected(
            device.name(),
            format!("{} is not an integer: {}", ATTR_IMAGE_COUNTER, value),
        )
        .into()
    })
}

fn unreachable_report(dev_name: &str, err: impl std::fmt::Display) -> StateReport {
    StateReport::new(
        CtState::Fault,
        format!("{} is not Running, is unreachable: {}", dev_name, err),
    )
}

/// Switch the analyzer to event mode if needed, reinitialize it and give it
/// `settle_delay` to accept commands again.
fn ensure_event_mode(analyzer: &dyn DeviceAdapter, settle_delay: Duration) -> CtResult<()> {
    let props = analyzer.get_property(PROP_MODE)?;
    let mode = first_property_value(&props, PROP_MODE).unwrap_or_default();
    if mode.eq_ignore_ascii_case(EVENT_MODE) {
        return Ok(());
    }
    warn!(
        device = analyzer.name(),
        from = mode,
        "Changing {} property {} to {}",
        analyzer.name(),
        PROP_MODE,
        EVENT_MODE
    );
    analyzer.put_property(PROP_MODE, vec![EVENT_MODE.to_string()])?;
    analyzer.command(CMD_INIT)?;
    std::thread::sleep(settle_delay);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{MockCall, MockDevice, MockRegistry};
    use std::time::Instant;
    use tracing_test::traced_test;

    const IBA: &str = "bl/di/iba-01";
    const CCD: &str = "bl/di/ccd-01";

    fn config(attrs: &str) -> ControllerConfig {
        ControllerConfig::new(IBA, attrs).with_settle_delay(Duration::ZERO)
    }

    fn setup(attrs: &str) -> (ImgBeamAnalyzerCtrl, MockDevice, MockDevice) {
        let (registry, iba, ccd) = MockRegistry::paired(IBA, CCD);
        let ctrl = ImgBeamAnalyzerCtrl::new(&config(attrs), &registry);
        (ctrl, iba, ccd)
    }

    #[test]
    fn resolves_imaging_device_through_analyzer_property() {
        let (ctrl, iba, _ccd) = setup("flux");
        assert!(ctrl.is_connected());
        assert_eq!(ctrl.imaging_name(), Some(CCD));
        assert!(iba
            .calls()
            .contains(&MockCall::GetProperty(PROP_IMAGE_DEVICE.into())));
    }

    #[test]
    #[traced_test]
    fn corrects_analyzer_mode() {
        let (registry, iba, _ccd) = MockRegistry::paired(IBA, CCD);
        iba.set_property(PROP_MODE, &["OneShot"]);
        let ctrl = ImgBeamAnalyzerCtrl::new(&config("flux"), &registry);

        assert!(ctrl.is_connected());
        assert_eq!(iba.commands(), vec![CMD_INIT]);
        assert!(iba.calls().contains(&MockCall::PutProperty(
            PROP_MODE.into(),
            vec![EVENT_MODE.into()]
        )));
        assert!(logs_contain("Changing"));
    }

    #[test]
    fn mode_correction_waits_after_init() {
        let (registry, iba, _ccd) = MockRegistry::paired(IBA, CCD);
        iba.set_property(PROP_MODE, &["OneShot"]);
        let settle = Duration::from_millis(30);
        let cfg = ControllerConfig::new(IBA, "flux").with_settle_delay(settle);

        let begin = Instant::now();
        let ctrl = ImgBeamAnalyzerCtrl::new(&cfg, &registry);
        assert!(begin.elapsed() >= settle);
        assert!(ctrl.is_connected());

        let calls = iba.calls();
        let put = calls
            .iter()
            .position(|c| matches!(c, MockCall::PutProperty(name, _) if name == PROP_MODE))
            .unwrap();
        let init = calls
            .iter()
            .position(|c| *c == MockCall::Command(CMD_INIT.into()))
            .unwrap();
        assert!(put < init);
    }

    #[test]
    fn event_mode_skips_settle_wait() {
        let (registry, iba, _ccd) = MockRegistry::paired(IBA, CCD);
        iba.set_property(PROP_MODE, &["event"]);
        let settle = Duration::from_secs(5);
        let cfg = ControllerConfig::new(IBA, "flux").with_settle_delay(settle);

        let begin = Instant::now();
        let _ctrl = ImgBeamAnalyzerCtrl::new(&cfg, &registry);
        assert!(begin.elapsed() < settle);
        assert!(iba.commands().is_empty());
    }

    #[test]
    fn event_mode_is_case_insensitive() {
        let (registry, iba, _ccd) = MockRegistry::paired(IBA, CCD);
        iba.set_property(PROP_MODE, &["event"]);
        let _ctrl = ImgBeamAnalyzerCtrl::new(&config("flux"), &registry);
        assert!(iba.commands().is_empty());
    }

    #[test]
    #[traced_test]
    fn missing_analyzer_leaves_controller_degraded() {
        let registry = MockRegistry::new();
        let mut ctrl = ImgBeamAnalyzerCtrl::new(&config("flux sigma"), &registry);

        assert!(!ctrl.is_connected());
        assert!(ctrl.setup_error().is_some());
        assert!(logs_contain("controller left degraded"));
        // Channel registration still works off the attribute list.
        assert!(ctrl.add_device(3).is_ok());
        assert_eq!(ctrl.state_all().state, CtState::Fault);
        assert!(!ctrl.pre_start_one(1));
    }

    #[test]
    fn missing_imaging_device_keeps_analyzer() {
        let iba = MockDevice::analyzer(IBA, CCD);
        let mut registry = MockRegistry::new();
        registry.register(iba);
        let mut ctrl = ImgBeamAnalyzerCtrl::new(&config("flux"), &registry);

        assert!(!ctrl.is_connected());
        assert_eq!(ctrl.state_all().state, CtState::Ready);
        assert!(matches!(ctrl.start_all(), Err(CtError::NotConnected("imaging"))));
    }

    #[test]
    fn arm_starts_analyzer_and_stops_imaging() {
        let (mut ctrl, iba, ccd) = setup("flux");
        iba.set_state(DeviceState::Idle);
        ccd.set_state(DeviceState::Running);
        iba.clear_calls();

        ctrl.load_one(1, 0.2, 1, 0.0).unwrap();
        assert!(ctrl.pre_start_one(1));

        assert_eq!(iba.commands(), vec![CMD_START]);
        assert_eq!(ccd.commands(), vec![CMD_STOP]);
        assert_eq!(ccd.attribute(ATTR_EXPOSURE_TIME), Some(AttrValue::Float(200.0)));
        assert_eq!(ccd.attribute(ATTR_TRIGGER_MODE), Some(AttrValue::Int(0)));
    }

    #[test]
    fn arm_leaves_open_imaging_device_alone() {
        let (mut ctrl, iba, ccd) = setup("flux");
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        assert!(ctrl.pre_start_one(1));
        assert!(iba.commands().is_empty());
        assert!(ccd.commands().is_empty());
    }

    #[test]
    fn arm_records_baseline() {
        let (mut ctrl, iba, ccd) = setup("flux");
        iba.set_attribute(ATTR_IMAGE_COUNTER, 41i64);
        ccd.set_attribute(ATTR_IMAGE_COUNTER, 7i64);
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        assert!(ctrl.pre_start_one(1));
        assert_eq!(
            ctrl.cycle().baseline,
            Some(Baseline {
                analyzer: 41,
                imaging: 7
            })
        );
    }

    #[test]
    #[traced_test]
    fn failed_arm_keeps_previous_baseline() {
        let (mut ctrl, iba, ccd) = setup("flux");
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        assert!(ctrl.pre_start_one(1));
        let armed = ctrl.cycle().baseline;

        ccd.set_attribute(ATTR_IMAGE_COUNTER, 5i64);
        iba.remove_attribute(ATTR_IMAGE_COUNTER);
        assert!(!ctrl.pre_start_one(1));
        assert_eq!(ctrl.cycle().baseline, armed);
        assert!(logs_contain("PreStartOne(1) failed"));
    }

    #[test]
    fn arm_without_load_fails() {
        let (mut ctrl, _iba, _ccd) = setup("flux");
        assert!(!ctrl.pre_start_one(1));
        assert!(ctrl.cycle().baseline.is_none());
    }

    #[test]
    #[traced_test]
    fn busy_logs_imaging_finished_first() {
        let (mut ctrl, _iba, _ccd) = setup("flux");
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        assert!(ctrl.pre_start_one(1));
        ctrl.start_all().unwrap();

        assert_eq!(ctrl.state_all().state, CtState::Busy);
        assert!(logs_contain("Imaging device finished but analyzer still processing"));
    }

    #[test]
    fn unreachable_analyzer_is_fault() {
        let (mut ctrl, iba, _ccd) = setup("flux");
        iba.disconnect();
        let report = ctrl.state_all().clone();
        assert_eq!(report.state, CtState::Fault);
        assert!(report.status.contains(IBA));
    }

    #[test]
    fn load_validates_before_mutating() {
        let (mut ctrl, _iba, _ccd) = setup("flux");
        ctrl.load_one(1, 0.5, 1, 0.1).unwrap();
        let before = ctrl.cycle().clone();

        assert!(ctrl.load_one(1, -1.0, 1, 0.0).is_err());
        assert!(ctrl.load_one(1, f64::NAN, 1, 0.0).is_err());
        assert!(ctrl.load_one(1, 0.2, 0, 0.0).is_err());
        assert!(ctrl.load_one(3, 0.2, 1, 0.0).is_err());
        assert_eq!(ctrl.cycle(), &before);
        assert_eq!(ctrl.latency_time(), 0.1);
    }

    #[test]
    fn abort_keeps_started_by_default() {
        let (mut ctrl, _iba, ccd) = setup("flux");
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        assert!(ctrl.pre_start_one(1));
        ctrl.start_all().unwrap();
        ccd.clear_calls();

        ctrl.abort_one(1).unwrap();
        assert_eq!(ccd.commands(), vec![CMD_STOP]);
        assert!(ctrl.cycle().aborted);
        assert!(ctrl.cycle().started);
        assert_eq!(ctrl.state_all().state, CtState::Busy);
    }

    #[test]
    fn abort_can_clear_started() {
        let (registry, _iba, _ccd) = MockRegistry::paired(IBA, CCD);
        let mut cfg = config("flux");
        cfg.abort_clears_started = true;
        let mut ctrl = ImgBeamAnalyzerCtrl::new(&cfg, &registry);
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        assert!(ctrl.pre_start_one(1));
        ctrl.start_all().unwrap();

        ctrl.abort_one(1).unwrap();
        assert!(!ctrl.cycle().started);
        assert_eq!(ctrl.state_all().state, CtState::Ready);
    }

    #[test]
    fn timer_axis_is_never_queued() {
        let (mut ctrl, _iba, _ccd) = setup("flux sigma");
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        ctrl.pre_read_one(1).unwrap();
        ctrl.pre_read_one(3).unwrap();
        assert_eq!(ctrl.cycle().pending().collect::<Vec<_>>(), vec![1]);
        assert!(ctrl.pre_read_one(4).is_err());
    }

    #[test]
    fn empty_bulk_read_skips_device() {
        let (mut ctrl, iba, _ccd) = setup("flux");
        ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
        ctrl.state_all();
        iba.clear_calls();
        ctrl.read_all().unwrap();
        assert!(!iba
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::ReadAttributes(_))));
    }

    #[test]
    fn state_one_mirrors_last_state_all() {
        let (mut ctrl, iba, _ccd) = setup("flux");
        assert_eq!(ctrl.state_one(1), StateReport::initial());
        iba.set_state(DeviceState::Fault);
        ctrl.state_all();
        assert_eq!(ctrl.state_one(2).state, CtState::Fault);
    }

    #[test]
    fn controller_metadata() {
        let info = ImgBeamAnalyzerCtrl::info();
        assert_eq!(info.model, "ImgBeamAnalyzer_CT");
        assert_eq!(info.max_device, 1024);
    }
}
