//! # Image Beam Analyzer Counter/Timer
//!
//! Coordinates an image beam analyzer device and the imaging device feeding it
//! so that an acquisition orchestrator can drive the pair as one multi-channel
//! counter/timer.
//!
//! ## Crate Structure
//!
//! - **`device`**: the Device Adapter layer. A synchronous request/response
//!   trait over one device (`DeviceAdapter`), name resolution
//!   (`DeviceConnector`) and simulated devices for tests and dry runs.
//! - **`controller`**: the Acquisition Coordinator. Arms both devices, detects
//!   completion from frame counters and serves per-channel values for one
//!   acquisition cycle at a time.
//! - **`config`**: Figment-based configuration (TOML file + environment).
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: `DeviceError` and `CtError`.

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod logging;

pub use controller::{CounterTimerController, CtState, ImgBeamAnalyzerCtrl, StateReport};
pub use error::{CtError, CtResult, DeviceError, DeviceResult};
