//! Explicit fixed-step integration schemes.

use transfer_core::{Control, State};

use crate::model::Dynamics;

/// Explicit one-step scheme used for open-loop simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// Forward Euler, first order.
    Euler,
    /// Classical fourth-order Runge-Kutta.
    #[default]
    RungeKutta4,
}

impl Scheme {
    /// Advance `state` by `dt` holding `control` constant.
    pub fn step<D: Dynamics + ?Sized>(
        self,
        dynamics: &D,
        state: &State,
        control: &Control,
        dt: f64,
    ) -> State {
        match self {
            Scheme::Euler => euler_step(dynamics, state, control, dt),
            Scheme::RungeKutta4 => rk4_step(dynamics, state, control, dt),
        }
    }
}

/// One forward Euler step.
pub fn euler_step<D: Dynamics + ?Sized>(
    dynamics: &D,
    state: &State,
    control: &Control,
    dt: f64,
) -> State {
    state + dynamics.derivative(state, control) * dt
}

/// One classical Runge-Kutta 4 step.
pub fn rk4_step<D: Dynamics + ?Sized>(
    dynamics: &D,
    state: &State,
    control: &Control,
    dt: f64,
) -> State {
    let half = 0.5 * dt;
    let k1 = dynamics.derivative(state, control);
    let k2 = dynamics.derivative(&(state + k1 * half), control);
    let k3 = dynamics.derivative(&(state + k2 * half), control);
    let k4 = dynamics.derivative(&(state + k3 * dt), control);
    state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RocketDynamics;
    use transfer_core::{Body, Vector2, World};

    /// A lone attracting body (the second one is massless and far away).
    fn lone_body() -> RocketDynamics {
        RocketDynamics::new(World::new(
            Body::new("sun", Vector2::zeros(), 1.0),
            Body::new("ghost", Vector2::new(1.0e6, 0.0), 0.0),
        ))
    }

    fn circular_orbit_error(scheme: Scheme, steps: usize) -> f64 {
        let model = lone_body();
        let period = 2.0 * std::f64::consts::PI;
        let dt = period / steps as f64;
        let start = State::new(1.0, 0.0, 0.0, 1.0);
        let mut x = start;
        for _ in 0..steps {
            x = scheme.step(&model, &x, &Control::zeros(), dt);
        }
        (x - start).norm()
    }

    #[test]
    fn rk4_closes_circular_orbit() {
        assert!(circular_orbit_error(Scheme::RungeKutta4, 400) < 1e-6);
    }

    #[test]
    fn rk4_is_fourth_order() {
        let coarse = circular_orbit_error(Scheme::RungeKutta4, 100);
        let fine = circular_orbit_error(Scheme::RungeKutta4, 200);
        let ratio = coarse / fine;
        assert!((12.0..20.0).contains(&ratio), "ratio = {ratio}");
    }

    #[test]
    fn euler_drifts_more_than_rk4() {
        let euler = circular_orbit_error(Scheme::Euler, 400);
        let rk4 = circular_orbit_error(Scheme::RungeKutta4, 400);
        assert!(euler > 100.0 * rk4);
    }
}
