//! Open-loop replay of a control tape over a time grid.

use thiserror::Error;
use transfer_core::{Control, ShapeError, State, Trajectory, World};

use crate::integrator::Scheme;
use crate::model::{Dynamics, RocketDynamics};

/// Errors raised when the simulation inputs do not line up.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("time array must hold at least one sample")]
    EmptyTimeArray,
    #[error("{times} time samples need {expected} controls, got {controls}")]
    ControlCount {
        times: usize,
        controls: usize,
        expected: usize,
    },
    #[error("initial state must be finite")]
    NonFiniteState,
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Fixed-step simulator over an arbitrary (possibly non-uniform) time grid.
///
/// Each interval `[t_i, t_{i+1}]` is split into `substeps` equal explicit steps
/// with the interval's control held constant.
#[derive(Debug, Clone)]
pub struct Simulator<D> {
    dynamics: D,
    scheme: Scheme,
    substeps: usize,
}

impl<D: Dynamics> Simulator<D> {
    pub fn new(dynamics: D) -> Self {
        Self {
            dynamics,
            scheme: Scheme::default(),
            substeps: 1,
        }
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_substeps(mut self, substeps: usize) -> Self {
        self.substeps = substeps.max(1);
        self
    }

    /// State reached from `state` after `dt` under `control`.
    pub fn advance(&self, state: &State, control: &Control, dt: f64) -> State {
        let h = dt / self.substeps as f64;
        (0..self.substeps).fold(*state, |x, _| {
            self.scheme.step(&self.dynamics, &x, control, h)
        })
    }

    /// Replay `controls` from `initial_state` over `times`.
    ///
    /// `controls` holds one entry per interval; a trailing entry aligned with the
    /// last time stamp is accepted and ignored.
    pub fn simulate_states_over_time(
        &self,
        initial_state: &State,
        times: &[f64],
        controls: &[Control],
    ) -> Result<Trajectory, SimulationError> {
        if times.is_empty() {
            return Err(SimulationError::EmptyTimeArray);
        }
        if !transfer_core::state::is_finite(initial_state) {
            return Err(SimulationError::NonFiniteState);
        }
        let intervals = times.len() - 1;
        let controls = match controls.len() {
            n if n == intervals => controls,
            n if n == times.len() => &controls[..intervals],
            n => {
                return Err(SimulationError::ControlCount {
                    times: times.len(),
                    controls: n,
                    expected: intervals,
                });
            }
        };

        let mut states = Vec::with_capacity(times.len());
        states.push(*initial_state);
        for (i, control) in controls.iter().enumerate() {
            let dt = times[i + 1] - times[i];
            let next = self.advance(&states[i], control, dt);
            states.push(next);
        }
        Ok(Trajectory::new(states, controls.to_vec(), times.to_vec())?)
    }

    /// Replay with zero thrust on every interval.
    pub fn simulate_states_over_time_passive(
        &self,
        initial_state: &State,
        times: &[f64],
    ) -> Result<Trajectory, SimulationError> {
        let controls = vec![Control::zeros(); times.len().saturating_sub(1)];
        self.simulate_states_over_time(initial_state, times, &controls)
    }
}

/// RK4 replay of `input_trajectory` in `world`.
pub fn simulate_states_over_time(
    world: &World,
    initial_state: &State,
    time_array: &[f64],
    input_trajectory: &[Control],
) -> Result<Trajectory, SimulationError> {
    Simulator::new(RocketDynamics::new(world.clone())).simulate_states_over_time(
        initial_state,
        time_array,
        input_trajectory,
    )
}

/// RK4 coast of `initial_state` in `world`.
pub fn simulate_states_over_time_passive(
    world: &World,
    initial_state: &State,
    time_array: &[f64],
) -> Result<Trajectory, SimulationError> {
    Simulator::new(RocketDynamics::new(world.clone()))
        .simulate_states_over_time_passive(initial_state, time_array)
}
