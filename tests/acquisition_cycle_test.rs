//! End-to-end acquisition cycles against simulated devices.

use imgbeam_ct::config::ControllerConfig;
use imgbeam_ct::controller::{AcqSynch, MAX_DEVICE};
use imgbeam_ct::device::{
    AttrValue, DeviceState, MockDevice, MockRegistry, ATTR_IMAGE_COUNTER,
};
use imgbeam_ct::{CounterTimerController, CtError, CtState, ImgBeamAnalyzerCtrl};
use std::time::Duration;

const IBA: &str = "bl09/di/iba-01";
const CCD: &str = "bl09/di/ccd-01";

struct Bench {
    ctrl: ImgBeamAnalyzerCtrl,
    iba: MockDevice,
    ccd: MockDevice,
}

fn bench(attrs: &str) -> Bench {
    let (registry, iba, ccd) = MockRegistry::paired(IBA, CCD);
    let config = ControllerConfig::new(IBA, attrs).with_settle_delay(Duration::ZERO);
    let ctrl = ImgBeamAnalyzerCtrl::new(&config, &registry);
    assert!(ctrl.is_connected(), "setup failed: {:?}", ctrl.setup_error());
    Bench { ctrl, iba, ccd }
}

/// configure → arm every axis → start
fn start_cycle(b: &mut Bench, integration_time: f64, axes: &[usize]) {
    b.ctrl.load_one(1, integration_time, 1, 0.0).unwrap();
    for &axis in axes {
        assert!(b.ctrl.pre_start_one(axis), "axis {} failed to arm", axis);
    }
    b.ctrl.start_all().unwrap();
}

#[test]
fn register_channel_bounds() {
    let mut b = bench("flux sigma centroid");
    for axis in 1..=4 {
        assert!(b.ctrl.add_device(axis).is_ok(), "axis {}", axis);
    }
    for axis in [5, 6, MAX_DEVICE + 1] {
        let err = b.ctrl.add_device(axis).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, CtError::ChannelOutOfRange { max: 4, .. }));
    }
}

#[test]
fn flux_sigma_scenario() {
    let mut b = bench("flux sigma");
    for axis in 1..=3 {
        b.ctrl.add_device(axis).unwrap();
    }

    b.ctrl.load_one(1, 0.2, 1, 0.0).unwrap();
    assert_eq!(b.ctrl.state_all().state, CtState::Ready);
    assert_eq!(b.ctrl.read_one(1).unwrap(), Some(AttrValue::Float(0.2)));

    for axis in 1..=3 {
        assert!(b.ctrl.pre_start_one(axis));
    }
    let baseline = b.ctrl.cycle().baseline.unwrap();
    assert_eq!(baseline.analyzer, 0);
    assert_eq!(baseline.imaging, 0);

    b.ctrl.start_all().unwrap();
    assert!(b.ctrl.cycle().started);

    // Imaging device exposed, analyzer still working.
    assert_eq!(b.ccd.counter(), 1);
    for _ in 0..3 {
        assert_eq!(b.ctrl.state_all().state, CtState::Busy);
    }
    assert_eq!(b.ctrl.read_one(1).unwrap(), None);

    b.iba.complete_frame(&[
        ("flux", AttrValue::Float(1234.5)),
        ("sigma", AttrValue::Float(3.25)),
    ]);
    assert_eq!(b.ctrl.state_all().state, CtState::Ready);

    b.ctrl.pre_read_one(2).unwrap();
    b.ctrl.pre_read_one(3).unwrap();
    b.iba.clear_calls();
    b.ctrl.read_all().unwrap();
    assert_eq!(
        b.iba.calls(),
        vec![imgbeam_ct::device::mock::MockCall::ReadAttributes(vec![
            "flux".to_string(),
            "sigma".to_string()
        ])]
    );

    assert_eq!(b.ctrl.read_one(1).unwrap(), Some(AttrValue::Float(0.2)));
    assert_eq!(b.ctrl.read_one(2).unwrap(), Some(AttrValue::Float(1234.5)));
    assert_eq!(b.ctrl.read_one(3).unwrap(), Some(AttrValue::Float(3.25)));
}

#[test]
fn attribute_names_match_case_insensitively() {
    let (registry, iba, _ccd) = MockRegistry::paired(IBA, CCD);
    iba.set_attribute("BeamIntensity", 0.0);
    let config = ControllerConfig::new(IBA, "beamintensity").with_settle_delay(Duration::ZERO);
    let mut ctrl = ImgBeamAnalyzerCtrl::new(&config, &registry);

    ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
    assert!(ctrl.pre_start_one(1));
    ctrl.start_all().unwrap();
    iba.complete_frame(&[("BeamIntensity", AttrValue::Float(88.0))]);
    assert_eq!(ctrl.state_all().state, CtState::Ready);

    ctrl.pre_read_one(2).unwrap();
    ctrl.read_all().unwrap();
    assert_eq!(ctrl.read_one(2).unwrap(), Some(AttrValue::Float(88.0)));
}

#[test]
fn configure_clears_previous_cycle_values() {
    let mut b = bench("flux");
    start_cycle(&mut b, 0.1, &[1, 2]);
    b.iba.complete_frame(&[("flux", AttrValue::Float(1.0))]);
    assert_eq!(b.ctrl.state_all().state, CtState::Ready);
    b.ctrl.pre_read_one(2).unwrap();
    b.ctrl.read_all().unwrap();
    assert_eq!(b.ctrl.read_one(2).unwrap(), Some(AttrValue::Float(1.0)));

    b.ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
    assert_eq!(b.ctrl.state_all().state, CtState::Ready);
    let err = b.ctrl.read_one(2).unwrap_err();
    assert!(matches!(err, CtError::AttributeNotQueued(_)));
}

#[test]
fn read_without_queue_is_a_lookup_error() {
    let mut b = bench("flux sigma");
    start_cycle(&mut b, 0.1, &[1, 2, 3]);
    b.iba.complete_frame(&[("flux", AttrValue::Float(1.0))]);
    b.ctrl.state_all();

    b.ctrl.pre_read_one(2).unwrap();
    b.ctrl.read_all().unwrap();
    assert!(b.ctrl.read_one(2).is_ok());
    assert!(matches!(
        b.ctrl.read_one(3),
        Err(CtError::AttributeNotQueued(name)) if name == "sigma"
    ));
}

#[test]
fn hardware_trigger_rejected_without_mutation() {
    let mut b = bench("flux");
    b.ctrl.load_one(1, 0.3, 2, 0.05).unwrap();
    let before = b.ctrl.cycle().clone();

    for mode in [
        AcqSynch::HardwareTrigger,
        AcqSynch::HardwareGate,
        AcqSynch::HardwareStart,
        AcqSynch::SoftwareStart,
    ] {
        b.ctrl.set_synchronization(mode);
        let err = b.ctrl.load_one(1, 0.7, 1, 0.0).unwrap_err();
        assert!(matches!(err, CtError::SynchronizationUnsupported(m) if m == mode));
        assert_eq!(b.ctrl.cycle(), &before);
    }

    b.ctrl.set_synchronization(AcqSynch::SoftwareGate);
    assert!(b.ctrl.load_one(1, 0.7, 1, 0.0).is_ok());
}

#[test]
fn analyzer_not_running_is_fault_even_when_busy() {
    let mut b = bench("flux");
    start_cycle(&mut b, 0.1, &[1, 2]);
    assert_eq!(b.ctrl.state_all().state, CtState::Busy);

    b.iba.set_state(DeviceState::Fault);
    let report = b.ctrl.state_all().clone();
    assert_eq!(report.state, CtState::Fault);
    assert_eq!(report.status, format!("{} is not Running, is in FAULT", IBA));

    // A result arriving does not matter while the analyzer is not running.
    b.iba.advance_counter();
    b.iba.set_state(DeviceState::Idle);
    assert_eq!(b.ctrl.state_all().state, CtState::Fault);

    // Reads are gated on the last computed state.
    assert_eq!(b.ctrl.read_one(1).unwrap(), None);
    b.ctrl.pre_read_one(2).unwrap();
    b.iba.clear_calls();
    b.ctrl.read_all().unwrap();
    assert!(b.iba.calls().is_empty());
}

#[test]
fn arm_restarts_stopped_analyzer() {
    let mut b = bench("flux");
    b.iba.set_state(DeviceState::Idle);
    assert_eq!(b.ctrl.state_all().state, CtState::Fault);

    start_cycle(&mut b, 0.1, &[1]);
    assert_eq!(b.iba.current_state(), Some(DeviceState::Running));
    assert_eq!(b.ctrl.state_all().state, CtState::Busy);
}

#[test]
fn failed_arm_reports_false() {
    let mut b = bench("flux");
    b.ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
    b.ccd.disconnect();
    assert!(!b.ctrl.pre_start_one(1));
    assert!(b.ctrl.cycle().baseline.is_none());
}

#[test]
fn start_after_failed_arm_never_reports_ready() {
    let mut b = bench("flux");
    b.iba.set_attribute("flux", 7.5);

    b.ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
    b.ccd.disconnect();
    assert!(!b.ctrl.pre_start_one(1));
    b.ccd.fail_with(None);
    b.ctrl.start_all().unwrap();

    let report = b.ctrl.state_all().clone();
    assert_eq!(report.state, CtState::Fault);
    assert_eq!(report.status, format!("{} started without an armed baseline", IBA));

    // The value published before this cycle is not served.
    b.ctrl.pre_read_one(2).unwrap();
    b.ctrl.read_all().unwrap();
    assert_eq!(b.ctrl.read_one(2).unwrap(), None);

    // A fresh configure recovers.
    b.ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
    assert_eq!(b.ctrl.state_all().state, CtState::Ready);
}

#[test]
fn consecutive_cycles_use_fresh_baselines() {
    let mut b = bench("flux");
    for cycle in 1..=3 {
        start_cycle(&mut b, 0.05, &[1, 2]);
        let baseline = b.ctrl.cycle().baseline.unwrap();
        assert_eq!(baseline.analyzer, cycle - 1);
        assert_eq!(baseline.imaging, cycle - 1);
        assert_eq!(b.ctrl.state_all().state, CtState::Busy);

        b.iba.complete_frame(&[("flux", AttrValue::Float(cycle as f64))]);
        assert_eq!(b.ctrl.state_all().state, CtState::Ready);
        b.ctrl.pre_read_one(2).unwrap();
        b.ctrl.read_all().unwrap();
        assert_eq!(
            b.ctrl.read_one(2).unwrap(),
            Some(AttrValue::Float(cycle as f64))
        );
    }
    assert_eq!(b.iba.attribute(ATTR_IMAGE_COUNTER), Some(AttrValue::Int(3)));
}

#[test]
fn start_failure_propagates() {
    let mut b = bench("flux");
    b.ctrl.load_one(1, 0.1, 1, 0.0).unwrap();
    assert!(b.ctrl.pre_start_one(1));
    b.ccd.reject_command("Snap");
    assert!(matches!(b.ctrl.start_all(), Err(CtError::Device(_))));
    assert!(!b.ctrl.cycle().started);
}
