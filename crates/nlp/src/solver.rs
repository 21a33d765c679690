//! Solver interface and the outcome of a solve.

use std::fmt;
use std::time::Duration;

use crate::program::Program;

/// A back-end able to solve a [`Program`] from its seeded initial point.
pub trait Solver {
    /// Run to completion or until a budget is exhausted.
    ///
    /// Always returns the last iterate, even when the solve failed, so callers
    /// can inspect the best-effort point.
    fn solve(&self, program: &Program) -> Solution;
}

/// How a solve terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Feasible within tolerance and stationary.
    Converged,
    /// Constraint violation stagnated at the maximal penalty.
    Infeasible,
    /// Iteration budget exhausted.
    IterationLimit,
    /// Wall-clock budget exhausted.
    TimeLimit,
    /// Non-finite values the damping could not recover from.
    Numerical,
}

impl SolveStatus {
    pub fn is_converged(self) -> bool {
        matches!(self, SolveStatus::Converged)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SolveStatus::Converged => "converged",
            SolveStatus::Infeasible => "locally infeasible",
            SolveStatus::IterationLimit => "iteration limit reached",
            SolveStatus::TimeLimit => "time limit reached",
            SolveStatus::Numerical => "numerical failure",
        };
        f.write_str(label)
    }
}

/// Counters and final measures of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolveStats {
    pub outer_iterations: usize,
    pub inner_iterations: usize,
    pub elapsed: Duration,
    /// Objective value `0.5 * sum(r^2)` at the returned point.
    pub objective: f64,
    /// Largest constraint violation at the returned point.
    pub violation: f64,
    /// Penalty parameter when the solve stopped.
    pub penalty: f64,
    /// Projected-gradient norm reached by the last inner solve.
    pub optimality: f64,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub x: Vec<f64>,
    pub status: SolveStatus,
    pub stats: SolveStats,
    pub equality_multipliers: Vec<f64>,
    pub inequality_multipliers: Vec<f64>,
}

impl Solution {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }
}
