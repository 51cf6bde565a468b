//! Controller configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `IMGBEAM_CT_`, nested keys joined
//!    with `__`
//!
//! ```text
//! IMGBEAM_CT_CONTROLLER__DEV_NAME=bl/di/iba-01
//! IMGBEAM_CT_LOGGING__LEVEL=debug
//! ```
//!
//! # Example
//!
//! ```toml
//! [controller]
//! dev_name = "bl/di/iba-01"
//! attr_list = "BeamIntensity BeamCenterX BeamCenterY"
//! settle_delay_ms = 500
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

use crate::controller::channel::AttrList;
use crate::error::{CtError, CtResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "IMGBEAM_CT_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtConfig {
    /// `[controller]` section
    pub controller: ControllerConfig,
    /// `[logging]` section
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Properties of one controller instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Analyzer device identifier
    pub dev_name: String,
    /// Analyzer attributes served on axes 2 and above
    #[serde(default)]
    pub attr_list: AttrList,
    /// Pause after reinitializing the analyzer into event mode
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Whether abort also clears the cycle's started flag
    #[serde(default)]
    pub abort_clears_started: bool,
}

/// Tracing output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Output format for tracing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored (development)
    Pretty,
    /// Single line (production)
    #[default]
    Compact,
    /// JSON lines (log aggregation)
    Json,
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl ControllerConfig {
    /// Configuration with default timing for `dev_name`.
    pub fn new(dev_name: impl Into<String>, attr_list: impl Into<String>) -> Self {
        Self {
            dev_name: dev_name.into(),
            attr_list: AttrList::Joined(attr_list.into()),
            settle_delay_ms: default_settle_delay_ms(),
            abort_clears_started: false,
        }
    }

    /// Builder: settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Settle delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl CtConfig {
    /// Load from `path`, apply environment overrides and validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> CtResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults for `controller`, with environment overrides applied.
    pub fn from_env(controller: ControllerConfig) -> CtResult<Self> {
        let base = CtConfig {
            controller,
            logging: LoggingConfig::default(),
        };
        let config: Self = Figment::from(Serialized::defaults(base))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks that parsing cannot express.
    pub fn validate(&self) -> CtResult<()> {
        if self.controller.dev_name.trim().is_empty() {
            return Err(CtError::Configuration(
                "controller.dev_name must name the analyzer device".into(),
            ));
        }
        let level = self.logging.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(CtError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}
