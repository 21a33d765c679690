use thiserror::Error;

use crate::{Control, State};

/// Errors raised when a trajectory's sequences do not line up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("trajectory needs at least one state")]
    Empty,
    #[error("{states} states need {expected} controls, got {controls}")]
    ControlCount {
        states: usize,
        controls: usize,
        expected: usize,
    },
    #[error("{states} states need as many time stamps, got {times}")]
    TimeCount { states: usize, times: usize },
    #[error("time stamps must increase strictly (index {index})")]
    NonIncreasingTime { index: usize },
}

/// Knot states, the piecewise-constant controls between them, and their time stamps.
///
/// Invariant: `states.len() == controls.len() + 1 == times.len()`, times strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    states: Vec<State>,
    controls: Vec<Control>,
    times: Vec<f64>,
}

impl Trajectory {
    pub fn new(
        states: Vec<State>,
        controls: Vec<Control>,
        times: Vec<f64>,
    ) -> Result<Self, ShapeError> {
        if states.is_empty() {
            return Err(ShapeError::Empty);
        }
        if controls.len() + 1 != states.len() {
            return Err(ShapeError::ControlCount {
                states: states.len(),
                controls: controls.len(),
                expected: states.len() - 1,
            });
        }
        if times.len() != states.len() {
            return Err(ShapeError::TimeCount {
                states: states.len(),
                times: times.len(),
            });
        }
        if let Some(index) = times.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(ShapeError::NonIncreasingTime { index: index + 1 });
        }
        Ok(Self {
            states,
            controls,
            times,
        })
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of knot points.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false; a trajectory holds at least its initial state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of control intervals.
    pub fn intervals(&self) -> usize {
        self.controls.len()
    }

    pub fn initial_state(&self) -> &State {
        &self.states[0]
    }

    pub fn final_state(&self) -> &State {
        &self.states[self.states.len() - 1]
    }

    /// Elapsed time between the first and last knot.
    pub fn duration(&self) -> f64 {
        self.times[self.times.len() - 1] - self.times[0]
    }

    /// Duration of interval `i`.
    pub fn step(&self, i: usize) -> f64 {
        self.times[i + 1] - self.times[i]
    }
}
