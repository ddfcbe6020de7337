// src/action.rs
//
// Bidirectional action conversion between the environment control space and
// the model output space.
//
// - Environment space: (steer, throttle, brake), throttle/brake in [0, 1].
// - Model space: (steer, signed acceleration), acceleration = throttle - brake.
//
// The projection into model space is only defined when throttle and brake
// are not applied simultaneously; a row violating that precondition is
// rejected rather than silently folded, since the 2-channel encoding cannot
// represent it.

/// Dimension of an environment-space action row.
pub const ENV_ACTION_DIM: usize = 3;

/// Dimension of a model-space action row.
pub const MODEL_ACTION_DIM: usize = 2;

/// Environment-space action row: `[steer, throttle, brake]`.
pub type EnvAction = [f32; ENV_ACTION_DIM];

/// Model-space action row: `[steer, signed_acceleration]`.
pub type ModelAction = [f32; MODEL_ACTION_DIM];

/// Errors produced by action-space conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpaceError {
    /// A row applies throttle and brake at the same time; no projection into
    /// the signed-acceleration encoding exists.
    ThrottleBrakeOverlap {
        row: usize,
        throttle: f32,
        brake: f32,
    },
}

impl std::fmt::Display for ActionSpaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionSpaceError::ThrottleBrakeOverlap {
                row,
                throttle,
                brake,
            } => write!(
                f,
                "action row {} has both throttle ({}) and brake ({}) engaged; \
                 no model-space projection exists",
                row, throttle, brake
            ),
        }
    }
}

impl std::error::Error for ActionSpaceError {}

/// Convert a batch of environment actions into model space.
///
/// Fails on the first row with `throttle > 0` and `brake > 0`. For valid
/// rows the mapping is lossless: steer is unchanged and the signed
/// acceleration is `throttle - brake`.
pub fn to_model_space(actions: &[EnvAction]) -> Result<Vec<ModelAction>, ActionSpaceError> {
    let mut converted = Vec::with_capacity(actions.len());
    for (row, &[steer, throttle, brake]) in actions.iter().enumerate() {
        if throttle > 0.0 && brake > 0.0 {
            return Err(ActionSpaceError::ThrottleBrakeOverlap {
                row,
                throttle,
                brake,
            });
        }
        converted.push([steer, throttle - brake]);
    }
    Ok(converted)
}

/// Convert a batch of model outputs back into environment actions.
///
/// Total function: positive acceleration becomes throttle, negative
/// acceleration becomes brake, and the other pedal stays at zero.
pub fn to_env_space(outputs: &[ModelAction]) -> Vec<EnvAction> {
    outputs
        .iter()
        .map(|&[steer, accel]| [steer, accel.max(0.0), (-accel).max(0.0)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_space_projection() {
        let actions = [[0.25, 0.8, 0.0], [-0.5, 0.0, 0.6], [0.0, 0.0, 0.0]];
        let converted = to_model_space(&actions).expect("valid rows");
        assert_eq!(converted, vec![[0.25, 0.8], [-0.5, -0.6], [0.0, 0.0]]);
    }

    #[test]
    fn test_overlapping_pedals_rejected() {
        let actions = [[0.0, 0.5, 0.0], [0.1, 0.4, 0.2]];
        let err = to_model_space(&actions).unwrap_err();
        match err {
            ActionSpaceError::ThrottleBrakeOverlap {
                row,
                throttle,
                brake,
            } => {
                assert_eq!(row, 1);
                assert_eq!(throttle, 0.4);
                assert_eq!(brake, 0.2);
            }
        }
    }

    #[test]
    fn test_env_space_splits_acceleration_sign() {
        let outputs = [[0.3, 0.7], [-0.2, -0.9], [0.0, 0.0]];
        let controls = to_env_space(&outputs);
        assert_eq!(
            controls,
            vec![[0.3, 0.7, 0.0], [-0.2, 0.0, 0.9], [0.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn test_round_trip_on_valid_rows() {
        // throttle * brake == 0 holds for every row, so the round trip is
        // exact.
        let actions = [[0.25, 0.8, 0.0], [-0.5, 0.0, 0.6], [1.0, 0.0, 1.0]];
        let model = to_model_space(&actions).expect("valid rows");
        let back = to_env_space(&model);
        assert_eq!(back.as_slice(), actions.as_slice());
    }

    #[test]
    fn test_projection_idempotent_under_lossy_round_trip() {
        let actions = [[0.1, 0.9, 0.0], [0.0, 0.0, 0.4]];
        let once = to_model_space(&actions).expect("valid rows");
        let again = to_model_space(&to_env_space(&once)).expect("still valid");
        assert_eq!(once, again);
    }
}
