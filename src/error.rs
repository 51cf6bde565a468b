//! Custom error types for the controller.
//!
//! Two layers of errors exist, mirroring the two layers of the crate:
//!
//! - **`DeviceError`**: raised by a [`DeviceAdapter`](crate::device::DeviceAdapter)
//!   call. A device is either unreachable (`Unavailable`) or it answered and
//!   refused the request (`Rejected`).
//! - **`CtError`**: everything the acquisition coordinator can report to its
//!   caller. Device failures are wrapped with `#[from]` so call sites that must
//!   not fail softly can simply use `?`.
//!
//! Configuration errors (`Configuration`, `ChannelOutOfRange`,
//! `SynchronizationUnsupported`) are operator mistakes and are never swallowed.
//! `AttributeNotQueued` / `AttributeNotFetched` signal a read-scheduling bug in
//! the caller and are likewise propagated as-is.

use crate::controller::sync::AcqSynch;
use thiserror::Error;

/// Convenience alias for device-layer results.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Convenience alias for results using the controller error type.
pub type CtResult<T> = std::result::Result<T, CtError>;

/// Failure of a single request to a hardware device.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Device could not be reached
    #[error("Device '{device}' unavailable: {reason}")]
    Unavailable {
        /// Device identifier
        device: String,
        /// What went wrong
        reason: String,
    },

    /// Device answered but refused the request
    #[error("Device '{device}' rejected request: {reason}")]
    Rejected {
        /// Device identifier
        device: String,
        /// What went wrong
        reason: String,
    },
}

impl DeviceError {
    /// Build an `Unavailable` error for `device`.
    pub fn unavailable(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::Unavailable {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Build a `Rejected` error for `device`.
    pub fn rejected(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::Rejected {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Name of the device that produced the error.
    pub fn device(&self) -> &str {
        match self {
            DeviceError::Unavailable { device, .. } | DeviceError::Rejected { device, .. } => device,
        }
    }
}

/// Failure of a controller operation.
#[derive(Error, Debug)]
pub enum CtError {
    /// A device request failed
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Configuration sources could not be read or merged
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] figment::Error),

    /// Invalid configuration or argument
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Axis outside `1..=max`
    #[error("Channel {axis} not possible with the current attribute list (max {max})")]
    ChannelOutOfRange {
        /// Requested axis
        axis: usize,
        /// Highest valid axis
        max: usize,
    },

    /// Hardware-driven synchronization requested
    #[error("Synchronization {0} not supported, only software gate/trigger are allowed")]
    SynchronizationUnsupported(AcqSynch),

    /// Channel read without being queued for this cycle
    #[error("Attribute '{0}' was not queued for reading in this cycle")]
    AttributeNotQueued(String),

    /// Channel queued but the bulk read did not return it
    #[error("Attribute '{0}' was queued but has not been fetched yet")]
    AttributeNotFetched(String),

    /// Device handle was never resolved
    #[error("{0} device not connected")]
    NotConnected(&'static str),
}

impl CtError {
    /// True for operator/programmer errors that must abort the current step.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CtError::Configuration(_)
                | CtError::ChannelOutOfRange { .. }
                | CtError::SynchronizationUnsupported(_)
                | CtError::ConfigLoad(_)
        )
    }
}
