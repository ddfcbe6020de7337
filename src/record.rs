// src/record.rs
//
// One recorded driving session: aligned per-timestep series of frames,
// telemetry, expert actions, and road curvature. Immutable once loaded;
// the dataset copies out of it and never keeps references into it.

use crate::action::EnvAction;
use crate::telemetry::WHEEL_COUNT;
use crate::types::Frame;

/// Aligned raw time series for one driving session.
///
/// All series must have equal length; `validate` checks the invariant
/// before a record is allowed anywhere near the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    /// Raw observation frames (H×W×C bytes, pre-crop).
    pub frames: Vec<Frame>,
    /// Vehicle speed per timestep.
    pub speed: Vec<f64>,
    /// Angular velocity of each of the four wheels per timestep.
    pub wheel_omegas: Vec<[f64; WHEEL_COUNT]>,
    /// Vehicle yaw rate per timestep.
    pub angular_velocity: Vec<f64>,
    /// Steering joint angle per timestep.
    pub steering_joint_angle: Vec<f64>,
    /// Expert action per timestep: `[steer, throttle, brake]`.
    pub actions: Vec<EnvAction>,
    /// Road curvature per timestep.
    pub curvature: Vec<f64>,
}

impl TraceRecord {
    /// Empty record, useful as a builder seed.
    pub fn empty() -> Self {
        Self {
            frames: Vec::new(),
            speed: Vec::new(),
            wheel_omegas: Vec::new(),
            angular_velocity: Vec::new(),
            steering_joint_angle: Vec::new(),
            actions: Vec::new(),
            curvature: Vec::new(),
        }
    }

    /// Number of timesteps, defined by the frame series.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Check that every series carries one entry per timestep.
    pub fn validate(&self) -> Result<(), RecordError> {
        let expected = self.frames.len();
        let series: [(&'static str, usize); 6] = [
            ("speed", self.speed.len()),
            ("wheel_omegas", self.wheel_omegas.len()),
            ("angular_velocity", self.angular_velocity.len()),
            ("steering_joint_angle", self.steering_joint_angle.len()),
            ("actions", self.actions.len()),
            ("curvature", self.curvature.len()),
        ];
        for (name, got) in series {
            if got != expected {
                return Err(RecordError::MismatchedSeries {
                    series: name,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }

    /// Indices retained after subsampling with the given stride (every k-th
    /// timestep, starting at 0).
    pub fn subsample_indices(&self, stride: usize) -> impl Iterator<Item = usize> {
        (0..self.len()).step_by(stride.max(1))
    }
}

/// Errors raised by record validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A series' length disagrees with the frame series.
    MismatchedSeries {
        series: &'static str,
        expected: usize,
        got: usize,
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::MismatchedSeries {
                series,
                expected,
                got,
            } => write!(
                f,
                "record series '{}' has {} entries, expected {} (one per frame)",
                series, got, expected
            ),
        }
    }
}

impl std::error::Error for RecordError {}
