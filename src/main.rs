//! Simulated acquisition runner
//!
//! Plays the orchestrator role against a simulated analyzer/imaging pair:
//! registers every channel, then runs acquisition cycles through the full
//! counter/timer lifecycle and prints one JSON line per cycle.
//!
//! # Usage
//!
//! ```bash
//! # Three cycles of 0.2s with the built-in attribute list
//! cargo run -- --cycles 3 --integration-time 0.2
//!
//! # Use a configuration file (environment overrides still apply)
//! cargo run -- --config ct.toml
//!
//! # Show that hardware-triggered modes are refused
//! cargo run -- --synchronization hardware-trigger
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use imgbeam_ct::config::{ControllerConfig, CtConfig};
use imgbeam_ct::controller::{AcqSynch, TIMER_AXIS};
use imgbeam_ct::device::{AttrValue, MockDevice, MockRegistry, ATTR_EXPOSURE_TIME};
use imgbeam_ct::{logging, CounterTimerController, CtState, ImgBeamAnalyzerCtrl};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Imaging device the simulated analyzer is paired with.
const SIM_IMAGING: &str = "sim/ccd/01";

// =============================================================================
// CLI Argument Structure
// =============================================================================

/// Run simulated counter/timer acquisitions
#[derive(Parser, Debug)]
#[command(name = "imgbeam_ct")]
#[command(version)]
#[command(about = "Drive a simulated image beam analyzer counter/timer", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Analyzer device name when no configuration file is given
    #[arg(long, default_value = "sim/iba/01")]
    dev_name: String,

    /// Attribute list when no configuration file is given
    #[arg(long, default_value = "BeamIntensity BeamCenterX BeamCenterY")]
    attr_list: String,

    /// Integration time per cycle, in seconds
    #[arg(short = 't', long, default_value_t = 0.2)]
    integration_time: f64,

    /// Number of acquisition cycles
    #[arg(short = 'n', long, default_value_t = 1)]
    cycles: u32,

    /// Synchronization mode requested from the controller
    #[arg(short, long, value_enum, default_value_t = SynchArg::SoftwareTrigger)]
    synchronization: SynchArg,

    /// State polls before the simulated analyzer publishes its result
    #[arg(long, default_value_t = 3)]
    processing_polls: u32,

    /// Delay between state polls, in milliseconds
    #[arg(long, default_value_t = 20)]
    poll_interval_ms: u64,

    /// Give up on a cycle after this many milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SynchArg {
    SoftwareTrigger,
    SoftwareGate,
    SoftwareStart,
    HardwareTrigger,
    HardwareGate,
    HardwareStart,
}

impl From<SynchArg> for AcqSynch {
    fn from(arg: SynchArg) -> Self {
        match arg {
            SynchArg::SoftwareTrigger => AcqSynch::SoftwareTrigger,
            SynchArg::SoftwareGate => AcqSynch::SoftwareGate,
            SynchArg::SoftwareStart => AcqSynch::SoftwareStart,
            SynchArg::HardwareTrigger => AcqSynch::HardwareTrigger,
            SynchArg::HardwareGate => AcqSynch::HardwareGate,
            SynchArg::HardwareStart => AcqSynch::HardwareStart,
        }
    }
}

/// One completed acquisition, as printed.
#[derive(Debug, Serialize)]
struct CycleRecord {
    cycle: u32,
    timestamp: DateTime<Utc>,
    polls: u32,
    state: CtState,
    values: BTreeMap<String, AttrValue>,
}

/// The simulated devices, kept to play the analyzer's processing.
struct Bench {
    analyzer: MockDevice,
    imaging: MockDevice,
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    let mut log_config = config.logging.clone();
    if args.verbose {
        log_config.level = "debug".to_string();
    }
    logging::init_from_config(&log_config)?;

    let (registry, analyzer, imaging) = MockRegistry::paired(&config.controller.dev_name, SIM_IMAGING);
    let bench = Bench { analyzer, imaging };

    let mut ctrl = ImgBeamAnalyzerCtrl::new(&config.controller, &registry);
    if let Some(err) = ctrl.setup_error() {
        bail!("controller setup failed: {}", err);
    }
    ctrl.set_synchronization(args.synchronization.into());

    let axes: Vec<usize> = (TIMER_AXIS..=ctrl.channels().max_axis()).collect();
    for &axis in &axes {
        ctrl.add_device(axis)?;
    }
    info!(
        analyzer = ctrl.dev_name(),
        imaging = ctrl.imaging_name().unwrap_or_default(),
        channels = axes.len(),
        "Controller ready"
    );

    for cycle in 1..=args.cycles {
        let record = run_cycle(&mut ctrl, &bench, &args, &axes, cycle)
            .with_context(|| format!("cycle {} failed", cycle))?;
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<CtConfig> {
    let config = match &args.config {
        Some(path) => CtConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CtConfig::from_env(ControllerConfig::new(&args.dev_name, &args.attr_list))?,
    };
    Ok(config)
}

// =============================================================================
// Orchestration
// =============================================================================

fn run_cycle(
    ctrl: &mut ImgBeamAnalyzerCtrl,
    bench: &Bench,
    args: &Args,
    axes: &[usize],
    cycle: u32,
) -> Result<CycleRecord> {
    ctrl.load_one(TIMER_AXIS, args.integration_time, 1, 0.0)?;
    for &axis in axes {
        if !ctrl.pre_start_one(axis) {
            bail!("channel {} did not arm", axis);
        }
    }
    ctrl.start_all()?;

    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    let mut polls = 0;
    loop {
        let report = ctrl.state_all().clone();
        match report.state {
            CtState::Ready => break,
            CtState::Fault => bail!("acquisition fault: {}", report.status),
            CtState::Busy => {}
        }
        if Instant::now() >= deadline {
            warn!(cycle, polls, "Acquisition timed out, aborting");
            ctrl.abort_one(TIMER_AXIS)?;
            bail!("no analyzer result after {} ms", args.timeout_ms);
        }
        polls += 1;
        if polls == args.processing_polls {
            simulate_processing(bench, ctrl.channels().attributes(), cycle);
        }
        std::thread::sleep(Duration::from_millis(args.poll_interval_ms));
    }

    for &axis in axes {
        ctrl.pre_read_one(axis)?;
    }
    ctrl.read_all()?;

    let mut values = BTreeMap::new();
    for &axis in axes {
        let label = match axis {
            TIMER_AXIS => "integration_time".to_string(),
            _ => ctrl.channels().attribute(axis - 2).unwrap_or_default().to_string(),
        };
        if let Some(value) = ctrl.read_one(axis)? {
            values.insert(label, value);
        }
    }

    Ok(CycleRecord {
        cycle,
        timestamp: Utc::now(),
        polls,
        state: ctrl.state_one(TIMER_AXIS).state,
        values,
    })
}

/// Stand-in for the analyzer's own frame processing: derive one value per
/// attribute from the exposure of the captured frame.
fn simulate_processing(bench: &Bench, attributes: &[String], cycle: u32) {
    let exposure_ms = bench
        .imaging
        .attribute(ATTR_EXPOSURE_TIME)
        .and_then(|v| v.as_f64())
        .unwrap_or_default();
    let results: Vec<(&str, AttrValue)> = attributes
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = exposure_ms * (i + 1) as f64 + f64::from(cycle) * 0.01;
            (name.as_str(), AttrValue::Float(value))
        })
        .collect();
    bench.analyzer.complete_frame(&results);
}
