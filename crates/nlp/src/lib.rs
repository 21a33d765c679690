//! Nonlinear programs and a solver for them.
//!
//! A program is assembled with [`ProgramBuilder`]: continuous variables with
//! box bounds, equality blocks `c(x) == 0`, inequality blocks `g(x) <= 0` and
//! least-squares objective terms. Every block is a [`Function`] reporting its
//! values together with sparse gradient rows. [`ProgramBuilder::build`]
//! freezes the result into an immutable [`Program`] that any [`Solver`] can
//! consume; [`AugmentedLagrangian`] is the bundled back-end.

pub mod alm;
pub mod linalg;
pub mod program;
pub mod rows;
pub mod solver;

pub use alm::{AlmSettings, AugmentedLagrangian};
pub use linalg::LinearSolverKind;
pub use program::{Function, Program, ProgramBuilder, ProgramError, Variable};
pub use rows::Rows;
pub use solver::{Solution, SolveStats, SolveStatus, Solver};
