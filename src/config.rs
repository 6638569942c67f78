//! Engine configuration.
//!
//! Every heuristic constant of the liveness and verification decisions is
//! a configuration value rather than a literal in the code, so a deployment
//! can retune them without a rebuild. Defaults are the values the decision
//! rules were designed around.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::tracking::EyeSelection;

/// Liveness decision settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// EAR above which the previous frame counts as open.
    pub open_threshold: f64,
    /// EAR below which the current frame counts as closed.
    pub closed_threshold: f64,
    /// Mean motion above which the subject counts as live.
    pub motion_threshold: f64,
    /// Confidence contributed by each detected blink.
    pub blink_weight: f64,
    /// Eye(s) the EAR signal is computed from.
    pub eye: EyeSelection,
    /// Landmark sets below this detection confidence are ignored.
    pub min_face_confidence: f32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            open_threshold: 0.25,
            closed_threshold: 0.20,
            motion_threshold: 0.02,
            blink_weight: 0.5,
            eye: EyeSelection::Left,
            min_face_confidence: 0.0,
        }
    }
}

impl LivenessConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_range("liveness.open_threshold", self.open_threshold)?;
        unit_range("liveness.closed_threshold", self.closed_threshold)?;
        unit_range("liveness.motion_threshold", self.motion_threshold)?;
        unit_range("liveness.min_face_confidence", f64::from(self.min_face_confidence))?;

        if self.closed_threshold >= self.open_threshold {
            return Err(ConfigError::InvertedHysteresis {
                open: self.open_threshold,
                closed: self.closed_threshold,
            });
        }
        if !self.blink_weight.is_finite() || self.blink_weight < 0.0 {
            return Err(ConfigError::InvalidWeight(self.blink_weight));
        }
        Ok(())
    }
}

/// Identity verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Best attribute probability above which the face counts as a match.
    pub match_threshold: f64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
        }
    }
}

/// Time limits for external capabilities and whole requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Budget for one landmark call, in milliseconds.
    pub frame_timeout_ms: u64,
    /// Budget for a whole request, in milliseconds. Unlimited when absent.
    pub request_timeout_ms: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 2_000,
            request_timeout_ms: None,
        }
    }
}

impl LimitsConfig {
    /// Budget for one capability call.
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    /// Whole-request deadline, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Metrics exposition settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A fraction lies outside the unit interval.
    #[error("{name} must be within 0.0-1.0, got {value}")]
    OutOfRange {
        /// Offending key.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// The blink thresholds leave no hysteresis band.
    #[error("closed_threshold ({closed}) must be below open_threshold ({open})")]
    InvertedHysteresis {
        /// Configured open threshold.
        open: f64,
        /// Configured closed threshold.
        closed: f64,
    },
    /// Negative or non-finite blink weight.
    #[error("blink_weight must be a non-negative number, got {0}")]
    InvalidWeight(f64),
    /// Zero per-frame budget.
    #[error("frame_timeout_ms must be greater than zero")]
    InvalidTimeout,
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this layout.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// `[liveness]` decision constants.
    #[serde(default)]
    pub liveness: LivenessConfig,
    /// `[verification]` thresholds.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// `[limits]` time budgets.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// `[metrics]` exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.liveness.validate()?;
        unit_range("verification.match_threshold", self.verification.match_threshold)?;
        if self.limits.frame_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}
