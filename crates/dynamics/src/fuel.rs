//! Fuel proxy accounting.

use transfer_core::{Control, Trajectory};

/// Discrete time-integral of `k * |u|^2` for piecewise-constant controls.
///
/// `times` must hold one more sample than `controls`; extra samples are ignored.
pub fn fuel_consumption(controls: &[Control], times: &[f64], coefficient: f64) -> f64 {
    controls
        .iter()
        .zip(times.windows(2))
        .map(|(u, w)| coefficient * u.norm_squared() * (w[1] - w[0]))
        .sum()
}

/// Fuel proxy spent along a trajectory.
pub fn fuel_used(trajectory: &Trajectory, coefficient: f64) -> f64 {
    fuel_consumption(trajectory.controls(), trajectory.times(), coefficient)
}
