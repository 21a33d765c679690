//! Initial decision vectors.

use transfer_core::{Control, State, Trajectory, state, vector};
use transfer_orbits::TargetOrbit;

use super::layout::Layout;

/// Coast along the chord from the initial position to the nearest point of the
/// target circle, arriving with the orbit's tangential velocity. Controls start at zero.
pub fn straight_line(layout: &Layout, orbit: &TargetOrbit, duration: f64) -> Vec<f64> {
    let mut x = vec![0.0; layout.variable_count()];
    let initial = *layout.initial_state();
    let start = state::position(&initial);
    let target = orbit.reference_state_facing(&start);
    let delta = state::position(&target) - start;
    let chord_velocity = delta / duration;
    let n = layout.intervals();

    for knot in 1..n {
        let s = knot as f64 / n as f64;
        let position = start + delta * s;
        layout.set_state(&mut x, knot, &state::from_parts(&position, &chord_velocity));
    }
    layout.set_state(&mut x, n, &target);
    layout.set_duration(&mut x, duration);
    x
}

/// Resample `trajectory` onto the uniform knot grid.
///
/// States are interpolated linearly in normalized time; each interval takes the
/// control active at its midpoint. The duration is clamped into `[minimum, maximum]`.
pub fn warm_start(layout: &Layout, trajectory: &Trajectory, minimum: f64, maximum: f64) -> Vec<f64> {
    let mut x = vec![0.0; layout.variable_count()];
    let n = layout.intervals();
    let times = trajectory.times();
    let t0 = times[0];
    let span = trajectory.duration();

    for (knot, s) in vector::linspace(0.0, 1.0, n + 1).into_iter().enumerate().skip(1) {
        let state = sample_state(trajectory, t0 + s * span);
        layout.set_state(&mut x, knot, &state);
    }
    for i in 0..n {
        let s = (i as f64 + 0.5) / n as f64;
        let control = sample_control(trajectory, t0 + s * span);
        layout.set_control(&mut x, i, &control);
    }
    layout.set_duration(&mut x, span.clamp(minimum, maximum));
    x
}

/// Index `i` of the interval `[t_i, t_{i+1}]` holding `t`, clamped to the last one.
fn interval_index(times: &[f64], t: f64) -> usize {
    let last = times.len().saturating_sub(2);
    times
        .partition_point(|&ti| ti <= t)
        .saturating_sub(1)
        .min(last)
}

fn sample_state(trajectory: &Trajectory, t: f64) -> State {
    let times = trajectory.times();
    let states = trajectory.states();
    if states.len() == 1 {
        return states[0];
    }
    let i = interval_index(times, t);
    let w = ((t - times[i]) / (times[i + 1] - times[i])).clamp(0.0, 1.0);
    states[i] * (1.0 - w) + states[i + 1] * w
}

fn sample_control(trajectory: &Trajectory, t: f64) -> Control {
    let controls = trajectory.controls();
    if controls.is_empty() {
        return Control::zeros();
    }
    controls[interval_index(trajectory.times(), t)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use transfer_core::World;
    use transfer_orbits::OrbitDirection;

    fn orbit() -> TargetOrbit {
        TargetOrbit::around(&World::standard().destination, 0.5, OrbitDirection::CounterClockwise)
            .unwrap()
    }

    #[test]
    fn straight_line_ends_on_the_orbit() {
        let layout = Layout::free_time(10, State::new(-2.0, 0.1, 0.1, 3.0));
        let orbit = orbit();
        let x = straight_line(&layout, &orbit, 10.0);
        let terminal = layout.state(&x, 10);
        assert!(orbit.residuals(&terminal).norm() < 1e-12);
        assert_eq!(layout.duration(&x), 10.0);
        assert!((0..10).all(|i| layout.control(&x, i) == Control::zeros()));
        let midway = state::position(&layout.state(&x, 5));
        let start = state::position(layout.initial_state());
        let expected = (state::position(&terminal) + start) / 2.0;
        assert!((midway - expected).norm() < 1e-12);
    }

    #[test]
    fn warm_start_resamples_onto_a_finer_grid() {
        let states = vec![
            State::new(0.0, 0.0, 1.0, 0.0),
            State::new(1.0, 0.0, 1.0, 0.0),
            State::new(2.0, 0.0, 1.0, 0.0),
        ];
        let controls = vec![Control::new(1.0, 0.0), Control::new(0.0, 2.0)];
        let trajectory = Trajectory::new(states, controls, vec![0.0, 1.0, 2.0]).unwrap();
        let layout = Layout::free_time(4, State::new(0.0, 0.0, 1.0, 0.0));
        let x = warm_start(&layout, &trajectory, 5.0, 10.0);

        assert!((layout.state(&x, 1)[0] - 0.5).abs() < 1e-12);
        assert!((layout.state(&x, 3)[0] - 1.5).abs() < 1e-12);
        assert_eq!(layout.control(&x, 0), Control::new(1.0, 0.0));
        assert_eq!(layout.control(&x, 3), Control::new(0.0, 2.0));
        // duration 2 is clamped into the window
        assert_eq!(layout.duration(&x), 5.0);
    }
}
