// src/config.rs
//
// Central configuration for the Slipstream dataset pipeline.
// This is the single source of truth for the normalization constants,
// mask geometry, and dataset bounds used by every component. A Config is
// built once (defaults, or a YAML file, or CLI overrides) and injected by
// reference; nothing in the crate reads ambient global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Human-readable config / release version.
pub const CONFIG_VERSION: &str = "0.1.0";

fn config_version() -> &'static str {
    CONFIG_VERSION
}

/// Affine normalization constants for one scalar channel.
///
/// Applied as `(x - mean) / std`. `std` must be non-zero and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelNorm {
    pub mean: f64,
    pub std: f64,
}

impl ChannelNorm {
    /// Normalize one raw value into model space.
    #[inline]
    pub fn apply(&self, value: f64) -> f32 {
        ((value - self.mean) / self.std) as f32
    }
}

/// Rectangular image region, half-open on both axes (`row_min..row_max`,
/// `col_min..col_max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HudRegion {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl HudRegion {
    /// Whether (row, col) falls inside the region.
    #[inline]
    pub fn contains(&self, y: usize, x: usize) -> bool {
        y >= self.row_min && y < self.row_max && x >= self.col_min && x < self.col_max
    }
}

/// Observation-transform configuration: crop geometry, dashboard blanking,
/// mask thresholds, and pixel normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Number of top rows kept when cropping a frame. The region below the
    /// crop is dashboard / chassis and carries no road information.
    pub crop_height: usize,
    /// On-screen HUD overlay blanked out before mask extraction, in
    /// cropped-frame coordinates.
    pub hud: HudRegion,
    /// Neutral gray value the HUD region is overwritten with. The same value
    /// anchors the drivable-surface tolerance band.
    pub hud_gray: u8,
    /// A pixel whose red channel is strictly above this value counts as a
    /// track marker (chevron).
    pub marker_threshold: u8,
    /// A pixel whose channel mean is within this distance of `hud_gray`
    /// counts as drivable surface.
    pub drivable_tolerance: f64,
    /// Pixel normalization applied when an observation is served.
    pub pixel: ChannelNorm,
    /// Keep all three color channels. When false, stored frames are
    /// collapsed to a single grayscale channel to save memory.
    pub use_color: bool,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            crop_height: 84,
            hud: HudRegion {
                row_min: 65,
                row_max: 80,
                col_min: 45,
                col_max: 52,
            },
            hud_gray: 105,
            marker_threshold: 150,
            drivable_tolerance: 15.0,
            pixel: ChannelNorm {
                mean: 105.0,
                std: 60.0,
            },
            use_color: false,
        }
    }
}

/// Per-channel normalization for the telemetry state vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub speed: ChannelNorm,
    pub wheel_omega: ChannelNorm,
    /// Normalization for the derived wheel-slip proxy (std across the four
    /// wheel angular velocities).
    pub wheel_omega_std: ChannelNorm,
    pub angular_velocity: ChannelNorm,
    pub steering_joint_angle: ChannelNorm,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            speed: ChannelNorm {
                mean: 17.5,
                std: 10.0,
            },
            wheel_omega: ChannelNorm {
                mean: 55.0,
                std: 30.0,
            },
            wheel_omega_std: ChannelNorm {
                mean: 1.0,
                std: 2.5,
            },
            angular_velocity: ChannelNorm {
                mean: 0.0,
                std: 1.8,
            },
            steering_joint_angle: ChannelNorm {
                mean: 0.0,
                std: 0.35,
            },
        }
    }
}

/// Bounds and knobs for the bounded multi-stream dataset itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Maximum number of retained samples. Once exceeded, the oldest samples
    /// are evicted from all streams in lockstep.
    pub capacity: usize,
    /// Number of equal-width bins used when balancing over the acceleration
    /// channel.
    pub balance_bins: usize,
    /// Take every k-th timestep of a record before processing.
    pub sampling_stride: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            capacity: 25_000,
            balance_bins: 16,
            sampling_stride: 4,
        }
    }
}

/// Immutable pipeline configuration, injected into every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Config / release version (not read from files).
    #[serde(skip_deserializing, default = "config_version")]
    pub version: &'static str,
    pub observation: ObservationConfig,
    pub telemetry: TelemetryConfig,
    /// Normalization for the road-curvature channel, applied at ingest.
    pub curvature: ChannelNorm,
    pub dataset: DatasetConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            observation: ObservationConfig::default(),
            telemetry: TelemetryConfig::default(),
            curvature: ChannelNorm {
                mean: 0.0,
                std: 0.06,
            },
            dataset: DatasetConfig::default(),
        }
    }
}

impl Config {
    /// Load a config from a YAML file. Missing fields fall back to defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path_str,
            source: e.to_string(),
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a config from a YAML string. Missing fields fall back to
    /// defaults; the result is validated before being returned.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            source: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations no component can operate under.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check_norm(field: &'static str, norm: &ChannelNorm) -> Result<(), ConfigError> {
            if !norm.mean.is_finite() || !norm.std.is_finite() || norm.std == 0.0 {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: format!(
                        "mean must be finite and std finite and non-zero (got mean={}, std={})",
                        norm.mean, norm.std
                    ),
                });
            }
            Ok(())
        }

        check_norm("observation.pixel", &self.observation.pixel)?;
        check_norm("telemetry.speed", &self.telemetry.speed)?;
        check_norm("telemetry.wheel_omega", &self.telemetry.wheel_omega)?;
        check_norm("telemetry.wheel_omega_std", &self.telemetry.wheel_omega_std)?;
        check_norm("telemetry.angular_velocity", &self.telemetry.angular_velocity)?;
        check_norm(
            "telemetry.steering_joint_angle",
            &self.telemetry.steering_joint_angle,
        )?;
        check_norm("curvature", &self.curvature)?;

        let obs = &self.observation;
        if obs.crop_height == 0 {
            return Err(ConfigError::Validation {
                field: "observation.crop_height".to_string(),
                message: "crop height must be at least 1 row".to_string(),
            });
        }
        if obs.hud.row_min > obs.hud.row_max || obs.hud.col_min > obs.hud.col_max {
            return Err(ConfigError::Validation {
                field: "observation.hud".to_string(),
                message: "HUD region bounds must be ordered".to_string(),
            });
        }
        if obs.hud.row_max > obs.crop_height {
            return Err(ConfigError::Validation {
                field: "observation.hud".to_string(),
                message: format!(
                    "HUD region (rows ..{}) must sit inside the crop (height {})",
                    obs.hud.row_max, obs.crop_height
                ),
            });
        }
        if obs.drivable_tolerance < 0.0 || !obs.drivable_tolerance.is_finite() {
            return Err(ConfigError::Validation {
                field: "observation.drivable_tolerance".to_string(),
                message: "tolerance must be finite and non-negative".to_string(),
            });
        }

        let ds = &self.dataset;
        if ds.capacity == 0 {
            return Err(ConfigError::Validation {
                field: "dataset.capacity".to_string(),
                message: "capacity must be at least 1".to_string(),
            });
        }
        if ds.balance_bins == 0 {
            return Err(ConfigError::Validation {
                field: "dataset.balance_bins".to_string(),
                message: "balancing needs at least one bin".to_string(),
            });
        }
        if ds.sampling_stride == 0 {
            return Err(ConfigError::Validation {
                field: "dataset.sampling_stride".to_string(),
                message: "sampling stride must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Errors that can occur when loading or validating a config.
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io { path: String, source: String },
    Parse { source: String },
    Validation { field: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path, source)
            }
            ConfigError::Parse { source } => {
                write!(f, "Failed to parse config YAML: {}", source)
            }
            ConfigError::Validation { field, message } => {
                write!(f, "Config validation error in '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
