//! Solver invocation and extraction of the optimized trajectory.

use thiserror::Error;
use tracing::{info, warn};
use transfer_core::{ShapeError, Trajectory, World};
use transfer_dynamics::fuel_used;
use transfer_nlp::{AugmentedLagrangian, ProgramError, SolveStats, SolveStatus, Solver};

use crate::request::{InputError, TransferRequest};
use crate::transcription::{FormulatedTransfer, formulate};

/// Best-effort result of a failed solve, kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub trajectory: Trajectory,
    pub stats: SolveStats,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid transfer request: {0}")]
    InvalidInput(#[from] InputError),
    #[error("transfer is locally infeasible (constraint violation {violation:.3e})")]
    Infeasible {
        violation: f64,
        attempt: Box<Attempt>,
    },
    #[error("solver did not converge: {reason} (constraint violation {violation:.3e})")]
    NotConverged {
        reason: SolveStatus,
        violation: f64,
        attempt: Box<Attempt>,
    },
    #[error("numerical failure in the solver")]
    Numerical { attempt: Box<Attempt> },
    #[error("malformed program: {0}")]
    Program(#[from] ProgramError),
    #[error("extracted trajectory is malformed: {0}")]
    Shape(#[from] ShapeError),
}

impl TransferError {
    /// Best-effort trajectory and statistics of a failed solve, when there is one.
    pub fn attempt(&self) -> Option<&Attempt> {
        match self {
            TransferError::Infeasible { attempt, .. }
            | TransferError::NotConverged { attempt, .. }
            | TransferError::Numerical { attempt } => Some(attempt),
            _ => None,
        }
    }
}

/// A converged transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedTransfer {
    pub trajectory: Trajectory,
    /// Fuel proxy `k * sum(|u_i|^2 * dt_i)` actually spent.
    pub fuel_used: f64,
    pub within_budget: bool,
    pub stats: SolveStats,
}

impl FormulatedTransfer {
    /// Solve with the augmented Lagrangian back-end configured in the request.
    pub fn solve(&self) -> Result<SolvedTransfer, TransferError> {
        self.solve_with(&AugmentedLagrangian::new(self.request.options.solver.clone()))
    }

    /// Solve with any back-end, starting from the seeded initial point.
    pub fn solve_with(&self, solver: &dyn Solver) -> Result<SolvedTransfer, TransferError> {
        let solution = solver.solve(&self.program);
        let trajectory = self.trajectory(&solution.x)?;
        let stats = solution.stats;
        let violation = stats.violation;
        let attempt = || {
            Box::new(Attempt {
                trajectory: trajectory.clone(),
                stats,
            })
        };

        match solution.status {
            SolveStatus::Converged => {}
            SolveStatus::Infeasible => {
                warn!(violation, "transfer is locally infeasible");
                return Err(TransferError::Infeasible {
                    violation,
                    attempt: attempt(),
                });
            }
            reason @ (SolveStatus::IterationLimit | SolveStatus::TimeLimit) => {
                warn!(%reason, violation, "transfer solve stopped early");
                return Err(TransferError::NotConverged {
                    reason,
                    violation,
                    attempt: attempt(),
                });
            }
            SolveStatus::Numerical => {
                warn!("transfer solve hit a numerical failure");
                return Err(TransferError::Numerical { attempt: attempt() });
            }
        }

        let options = &self.request.options;
        let fuel = fuel_used(&trajectory, options.fuel_coefficient);
        // the budget row is normalized, so allow its feasibility slack
        let within_budget =
            fuel <= options.fuel_budget * (1.0 + options.solver.feasibility_tolerance);
        info!(
            time_of_flight = trajectory.duration(),
            fuel,
            within_budget,
            outer = stats.outer_iterations,
            inner = stats.inner_iterations,
            "transfer solved"
        );
        Ok(SolvedTransfer {
            trajectory,
            fuel_used: fuel,
            within_budget,
            stats,
        })
    }
}

/// Formulate and solve `request` in `world`.
pub fn solve(world: &World, request: &TransferRequest) -> Result<SolvedTransfer, TransferError> {
    formulate(world, request)?.solve()
}
