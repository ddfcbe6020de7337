// src/telemetry.rs
//
// Per-timestep telemetry normalization into the flat state vector consumed
// by the policy. Usable on its own (a control loop normalizing live
// telemetry has no frames to process), and by the dataset during ingest.

use crate::config::TelemetryConfig;

/// Number of wheel angular-velocity channels.
pub const WHEEL_COUNT: usize = 4;

/// Dimension of the normalized state vector.
///
/// Channel order is fixed:
/// `[speed, omega0, omega1, omega2, omega3, omega_std, angular_velocity,
/// steering_angle]`.
pub const STATE_DIM: usize = 8;

/// Normalized per-timestep state vector.
pub type StateVector = [f32; STATE_DIM];

/// Population standard deviation across the four wheel angular velocities.
///
/// Divergence between wheel speeds is a cheap wheel-slip proxy, exposed to
/// the policy as its own derived channel.
pub fn wheel_omega_std(omegas: &[f64; WHEEL_COUNT]) -> f64 {
    let mean = omegas.iter().sum::<f64>() / WHEEL_COUNT as f64;
    let var = omegas.iter().map(|o| (o - mean) * (o - mean)).sum::<f64>() / WHEEL_COUNT as f64;
    var.sqrt()
}

/// Normalize one timestep of telemetry into the flat state vector.
///
/// Each channel is independently affine-normalized with its configured
/// `(mean, std)` pair; the wheel-slip proxy is computed on the raw wheel
/// omegas before their own normalization. Total function.
pub fn state_vector(
    speed: f64,
    wheel_omegas: &[f64; WHEEL_COUNT],
    angular_velocity: f64,
    steering_joint_angle: f64,
    cfg: &TelemetryConfig,
) -> StateVector {
    let slip = wheel_omega_std(wheel_omegas);
    [
        cfg.speed.apply(speed),
        cfg.wheel_omega.apply(wheel_omegas[0]),
        cfg.wheel_omega.apply(wheel_omegas[1]),
        cfg.wheel_omega.apply(wheel_omegas[2]),
        cfg.wheel_omega.apply(wheel_omegas[3]),
        cfg.wheel_omega_std.apply(slip),
        cfg.angular_velocity.apply(angular_velocity),
        cfg.steering_joint_angle.apply(steering_joint_angle),
    ]
}
