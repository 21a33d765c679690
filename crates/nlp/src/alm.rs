//! Augmented-Lagrangian outer loop over a bound-aware Levenberg-Marquardt
//! inner solver.
//!
//! For penalty `rho` and multipliers `lambda`, `mu` the inner merit
//!
//! ```text
//! 0.5 * sum(r_obj^2) + rho/2 * sum((c + lambda/rho)^2) + rho/2 * sum(max(0, g + mu/rho)^2)
//! ```
//!
//! is itself a sum of squares, so each inner iteration is a damped
//! Gauss-Newton step on the stacked residuals.

use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::linalg::{LinearSolverKind, normal_diagonal, solve_damped};
use crate::program::Program;
use crate::rows::Rows;
use crate::solver::{Solution, SolveStats, SolveStatus, Solver};

/// Damping applied to variables held on an active bound.
const PINNED: f64 = 1e30;
/// Inner loop gives up once the Marquardt parameter exceeds this.
const MAX_DAMPING: f64 = 1e20;
/// Floor on the diagonal used for Marquardt scaling.
const MIN_SCALE: f64 = 1e-6;

/// Tuning of [`AugmentedLagrangian`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlmSettings {
    pub max_outer_iterations: usize,
    pub max_inner_iterations: usize,
    /// Budget on inner iterations summed over the whole solve.
    pub max_total_iterations: usize,
    pub time_limit: Option<Duration>,
    pub feasibility_tolerance: f64,
    pub optimality_tolerance: f64,
    /// Projected-gradient tolerance of the first inner solve.
    pub initial_inner_tolerance: f64,
    pub initial_penalty: f64,
    pub penalty_growth: f64,
    pub max_penalty: f64,
    /// Penalty grows unless violation drops below this fraction of the previous one.
    pub required_decrease: f64,
    /// Stalled outer iterations at maximal penalty before declaring infeasibility.
    pub stall_limit: usize,
    pub initial_damping: f64,
    pub linear_solver: LinearSolverKind,
    /// Rows with more non-zeros are handled as low-rank updates.
    pub dense_row_threshold: usize,
}

impl Default for AlmSettings {
    fn default() -> Self {
        Self {
            max_outer_iterations: 50,
            max_inner_iterations: 300,
            max_total_iterations: 20_000,
            time_limit: None,
            feasibility_tolerance: 1e-6,
            optimality_tolerance: 1e-5,
            initial_inner_tolerance: 1e-1,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e8,
            required_decrease: 0.25,
            stall_limit: 3,
            initial_damping: 1e-3,
            linear_solver: LinearSolverKind::Auto,
            dense_row_threshold: 40,
        }
    }
}

/// Augmented-Lagrangian solver.
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangian {
    settings: AlmSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InnerExit {
    Tolerance,
    Stalled,
    IterationLimit,
    Budget,
    TimeLimit,
    Numerical,
}

struct InnerOutcome {
    iterations: usize,
    optimality: f64,
    exit: InnerExit,
}

/// Multipliers and penalty held fixed during one inner solve.
struct Penalty<'a> {
    rho: f64,
    lambda: &'a [f64],
    mu: &'a [f64],
}

#[derive(Default)]
struct Workspace {
    objective: Rows,
    equalities: Rows,
    inequalities: Rows,
    current: Rows,
    trial: Rows,
}

impl AugmentedLagrangian {
    pub fn new(settings: AlmSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AlmSettings {
        &self.settings
    }

    /// Stack objective, equality and inequality residuals into `out` and
    /// return the merit `0.5 * |out|^2`.
    fn assemble(
        program: &Program,
        x: &[f64],
        penalty: &Penalty<'_>,
        ws: &mut Workspace,
        out: &mut Rows,
    ) -> f64 {
        program.evaluate_objective(x, &mut ws.objective);
        program.evaluate_equalities(x, &mut ws.equalities);
        program.evaluate_inequalities(x, &mut ws.inequalities);

        out.clear();
        for row in 0..ws.objective.len() {
            out.push(ws.objective.value(row), ws.objective.entries(row));
        }
        let scale = penalty.rho.sqrt();
        for row in 0..ws.equalities.len() {
            let shifted = ws.equalities.value(row) + penalty.lambda[row] / penalty.rho;
            out.push(
                scale * shifted,
                ws.equalities.entries(row).map(|(c, a)| (c, scale * a)),
            );
        }
        for row in 0..ws.inequalities.len() {
            let shifted = ws.inequalities.value(row) + penalty.mu[row] / penalty.rho;
            if shifted > 0.0 {
                out.push(
                    scale * shifted,
                    ws.inequalities.entries(row).map(|(c, a)| (c, scale * a)),
                );
            } else {
                out.push(0.0, std::iter::empty());
            }
        }
        0.5 * out.squared_norm()
    }

    #[allow(clippy::too_many_arguments)]
    fn minimize_inner(
        &self,
        program: &Program,
        x: &mut Vec<f64>,
        penalty: &Penalty<'_>,
        tolerance: f64,
        budget: usize,
        deadline: Option<Instant>,
        ws: &mut Workspace,
    ) -> InnerOutcome {
        let n = x.len();
        let lower = program.lower_bounds();
        let upper = program.upper_bounds();
        let mut current = std::mem::take(&mut ws.current);
        let mut trial = std::mem::take(&mut ws.trial);

        let mut merit = Self::assemble(program, x, penalty, ws, &mut current);
        let mut damping = self.settings.initial_damping;
        let mut growth = 2.0;
        let mut gradient = current.gradient(n);
        let mut diagonal = normal_diagonal(&current, n);
        let mut optimality = f64::INFINITY;

        let outcome = |iterations, optimality, exit| InnerOutcome {
            iterations,
            optimality,
            exit,
        };

        let mut iteration = 0;
        let result = loop {
            if !merit.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
                break outcome(iteration, optimality, InnerExit::Numerical);
            }
            let active: Vec<bool> = (0..n)
                .map(|i| {
                    (x[i] <= lower[i] && gradient[i] > 0.0)
                        || (x[i] >= upper[i] && gradient[i] < 0.0)
                })
                .collect();
            optimality = gradient
                .iter()
                .zip(&active)
                .filter(|(_, pinned)| !**pinned)
                .fold(0.0_f64, |m, (g, _)| m.max(g.abs()));
            if optimality <= tolerance {
                break outcome(iteration, optimality, InnerExit::Tolerance);
            }
            if iteration >= self.settings.max_inner_iterations {
                break outcome(iteration, optimality, InnerExit::IterationLimit);
            }
            if iteration >= budget {
                break outcome(iteration, optimality, InnerExit::Budget);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break outcome(iteration, optimality, InnerExit::TimeLimit);
            }
            iteration += 1;

            let weights: Vec<f64> = diagonal
                .iter()
                .zip(&active)
                .map(|(d, &pinned)| if pinned { PINNED } else { damping * d.max(MIN_SCALE) })
                .collect();
            let rhs: Vec<f64> = gradient.iter().map(|g| -g).collect();
            let step = match solve_damped(
                self.settings.linear_solver,
                &current,
                &weights,
                &rhs,
                self.settings.dense_row_threshold,
            ) {
                Ok(step) => step,
                Err(err) => {
                    trace!(%err, damping, "factorization failed, raising damping");
                    damping *= growth;
                    growth *= 2.0;
                    if damping > MAX_DAMPING {
                        break outcome(iteration, optimality, InnerExit::Stalled);
                    }
                    continue;
                }
            };

            let mut candidate: Vec<f64> = x.iter().zip(&step).map(|(a, b)| a + b).collect();
            program.project(&mut candidate);
            let step: Vec<f64> = candidate.iter().zip(x.iter()).map(|(a, b)| a - b).collect();

            let model: f64 = current
                .apply(&step)
                .iter()
                .zip(current.values())
                .map(|(jd, r)| (r + jd).powi(2))
                .sum::<f64>()
                * 0.5;
            let predicted = merit - model;
            let candidate_merit = Self::assemble(program, &candidate, penalty, ws, &mut trial);
            let ratio = if predicted > 0.0 && candidate_merit.is_finite() {
                (merit - candidate_merit) / predicted
            } else {
                -1.0
            };

            if ratio > 0.0 {
                *x = candidate;
                std::mem::swap(&mut current, &mut trial);
                merit = candidate_merit;
                gradient = current.gradient(n);
                diagonal = normal_diagonal(&current, n);
                damping *= (1.0 - (2.0 * ratio - 1.0).powi(3)).max(1.0 / 3.0);
                growth = 2.0;
            } else {
                damping *= growth;
                growth *= 2.0;
            }
            trace!(iteration, merit, ratio, damping, "levenberg-marquardt step");

            let longest = step.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
            if longest < 1e-12 || damping > MAX_DAMPING {
                break outcome(iteration, optimality, InnerExit::Stalled);
            }
        };

        ws.current = current;
        ws.trial = trial;
        result
    }

    fn finish(
        program: &Program,
        x: Vec<f64>,
        status: SolveStatus,
        mut stats: SolveStats,
        lambda: Vec<f64>,
        mu: Vec<f64>,
        started: Instant,
    ) -> Solution {
        stats.elapsed = started.elapsed();
        stats.objective = program.objective_value(&x);
        stats.violation = program.violation(&x);
        info!(
            status = %status,
            outer = stats.outer_iterations,
            inner = stats.inner_iterations,
            objective = stats.objective,
            violation = stats.violation,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "augmented Lagrangian finished"
        );
        Solution {
            x,
            status,
            stats,
            equality_multipliers: lambda,
            inequality_multipliers: mu,
        }
    }
}

impl Solver for AugmentedLagrangian {
    fn solve(&self, program: &Program) -> Solution {
        let s = &self.settings;
        let started = Instant::now();
        let deadline = s.time_limit.map(|limit| started + limit);

        let mut x = program.initial_point();
        program.project(&mut x);
        let mut lambda = vec![0.0; program.equality_count()];
        let mut mu = vec![0.0; program.inequality_count()];
        let mut rho = s.initial_penalty;
        let mut tolerance = s.initial_inner_tolerance;
        let mut previous = f64::INFINITY;
        let mut stalled = 0;
        let mut ws = Workspace::default();
        let mut stats = SolveStats::default();

        debug!(
            variables = program.variable_count(),
            equalities = program.equality_count(),
            inequalities = program.inequality_count(),
            "starting augmented Lagrangian"
        );

        for outer in 0..s.max_outer_iterations {
            let budget = s.max_total_iterations.saturating_sub(stats.inner_iterations);
            let inner = self.minimize_inner(
                program,
                &mut x,
                &Penalty {
                    rho,
                    lambda: &lambda,
                    mu: &mu,
                },
                tolerance,
                budget,
                deadline,
                &mut ws,
            );
            stats.outer_iterations = outer + 1;
            stats.inner_iterations += inner.iterations;
            stats.optimality = inner.optimality;
            stats.penalty = rho;

            program.evaluate_equalities(&x, &mut ws.equalities);
            program.evaluate_inequalities(&x, &mut ws.inequalities);
            let equality_violation = ws
                .equalities
                .values()
                .iter()
                .fold(0.0_f64, |m, c| m.max(c.abs()));
            let violation = ws
                .inequalities
                .values()
                .iter()
                .zip(&mu)
                .fold(equality_violation, |m, (g, mu_k)| m.max(g.max(-mu_k / rho)));

            debug!(
                outer,
                penalty = rho,
                inner = inner.iterations,
                optimality = inner.optimality,
                violation,
                exit = ?inner.exit,
                "outer iteration"
            );

            if inner.exit == InnerExit::Numerical {
                return Self::finish(program, x, SolveStatus::Numerical, stats, lambda, mu, started);
            }
            // the inner solve has to reach the final tolerance, not just be asked for it
            let stationary = inner.optimality <= s.optimality_tolerance;
            if violation <= s.feasibility_tolerance
                && tolerance <= s.optimality_tolerance
                && stationary
            {
                return Self::finish(program, x, SolveStatus::Converged, stats, lambda, mu, started);
            }
            match inner.exit {
                InnerExit::TimeLimit => {
                    return Self::finish(program, x, SolveStatus::TimeLimit, stats, lambda, mu, started);
                }
                InnerExit::Budget => {
                    return Self::finish(
                        program,
                        x,
                        SolveStatus::IterationLimit,
                        stats,
                        lambda,
                        mu,
                        started,
                    );
                }
                _ => {}
            }

            for (l, c) in lambda.iter_mut().zip(ws.equalities.values()) {
                *l += rho * c;
            }
            for (m, g) in mu.iter_mut().zip(ws.inequalities.values()) {
                *m = (*m + rho * g).max(0.0);
            }

            if rho >= s.max_penalty
                && violation > s.feasibility_tolerance
                && violation > 0.9 * previous
            {
                stalled += 1;
                if stalled >= s.stall_limit {
                    return Self::finish(program, x, SolveStatus::Infeasible, stats, lambda, mu, started);
                }
            } else {
                stalled = 0;
            }
            if violation > s.required_decrease * previous {
                rho = (rho * s.penalty_growth).min(s.max_penalty);
            }
            previous = violation;
            tolerance = (tolerance * 0.1).max(s.optimality_tolerance);
        }

        Self::finish(program, x, SolveStatus::IterationLimit, stats, lambda, mu, started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Function, ProgramBuilder, Variable};

    /// `x_i - target_i` for every listed variable.
    struct Offset(Vec<(usize, f64)>);

    impl Function for Offset {
        fn rows(&self) -> usize {
            self.0.len()
        }

        fn columns(&self) -> usize {
            self.0.iter().map(|&(c, _)| c + 1).max().unwrap_or(0)
        }

        fn evaluate(&self, x: &[f64], out: &mut Rows) {
            for &(c, target) in &self.0 {
                out.push(x[c] - target, [(c, 1.0)]);
            }
        }
    }

    /// `x0^2 + x1^2 - r^2` (circle).
    struct Circle(f64);

    impl Function for Circle {
        fn rows(&self) -> usize {
            1
        }

        fn columns(&self) -> usize {
            2
        }

        fn evaluate(&self, x: &[f64], out: &mut Rows) {
            out.push(
                x[0] * x[0] + x[1] * x[1] - self.0 * self.0,
                [(0, 2.0 * x[0]), (1, 2.0 * x[1])],
            );
        }
    }

    /// `x0 + x1 - s`.
    struct SumAtLeast(f64);

    impl Function for SumAtLeast {
        fn rows(&self) -> usize {
            1
        }

        fn columns(&self) -> usize {
            2
        }

        fn evaluate(&self, x: &[f64], out: &mut Rows) {
            out.push(self.0 - x[0] - x[1], [(0, -1.0), (1, -1.0)]);
        }
    }

    /// Rosenbrock valley as residuals `(10 (x1 - x0^2), 1 - x0)`.
    struct Rosenbrock;

    impl Function for Rosenbrock {
        fn rows(&self) -> usize {
            2
        }

        fn columns(&self) -> usize {
            2
        }

        fn evaluate(&self, x: &[f64], out: &mut Rows) {
            out.push(10.0 * (x[1] - x[0] * x[0]), [(0, -20.0 * x[0]), (1, 10.0)]);
            out.push(1.0 - x[0], [(0, -1.0)]);
        }
    }

    fn solve(builder: ProgramBuilder) -> (Solution, Program) {
        let program = builder.build().unwrap();
        let solution = AugmentedLagrangian::default().solve(&program);
        (solution, program)
    }

    #[test]
    fn closest_point_on_circle() {
        let mut builder = ProgramBuilder::new();
        builder.add_free_variables(&[0.5, 0.2]);
        builder
            .add_objective(Offset(vec![(0, 3.0), (1, 4.0)]))
            .add_equality(Circle(1.0));
        let (solution, _) = solve(builder);
        assert!(solution.is_converged(), "{:?}", solution.status);
        assert!((solution.x[0] - 0.6).abs() < 1e-4);
        assert!((solution.x[1] - 0.8).abs() < 1e-4);
        assert!(solution.stats.violation < 1e-6);
    }

    #[test]
    fn inequality_becomes_active() {
        let mut builder = ProgramBuilder::new();
        builder.add_free_variables(&[0.0, 0.0]);
        builder
            .add_objective(Offset(vec![(0, 0.0), (1, 0.0)]))
            .add_inequality(SumAtLeast(2.0));
        let (solution, _) = solve(builder);
        assert!(solution.is_converged());
        assert!((solution.x[0] - 1.0).abs() < 1e-4);
        assert!((solution.x[1] - 1.0).abs() < 1e-4);
        assert!(solution.inequality_multipliers[0] > 0.0);
    }

    #[test]
    fn variable_bounds_are_respected() {
        let mut builder = ProgramBuilder::new();
        builder.add_variable(Variable::bounded(2.0, 5.0, 4.0));
        builder.add_objective(Offset(vec![(0, 0.0)]));
        let (solution, _) = solve(builder);
        assert!(solution.is_converged());
        assert_eq!(solution.x[0], 2.0);
    }

    #[test]
    fn contradictory_constraints_are_infeasible() {
        let mut builder = ProgramBuilder::new();
        builder.add_free_variables(&[0.0, 0.0]);
        builder
            .add_objective(Offset(vec![(0, 0.0)]))
            .add_equality(Circle(1.0))
            .add_inequality(SumAtLeast(4.0));
        let (solution, program) = solve(builder);
        assert!(matches!(
            solution.status,
            SolveStatus::Infeasible | SolveStatus::IterationLimit
        ));
        assert!(program.violation(&solution.x) > 0.1);
    }

    #[test]
    fn capped_inner_budget_is_not_reported_as_converged() {
        let mut builder = ProgramBuilder::new();
        builder.add_free_variables(&[-1.2, 1.0]);
        builder.add_objective(Rosenbrock);
        let program = builder.build().unwrap();
        let solver = AugmentedLagrangian::new(AlmSettings {
            max_inner_iterations: 1,
            max_outer_iterations: 3,
            ..AlmSettings::default()
        });
        let solution = solver.solve(&program);
        assert_eq!(solution.status, SolveStatus::IterationLimit);
        assert!(solution.stats.optimality > solver.settings().optimality_tolerance);
    }

    #[test]
    fn rosenbrock_converges_to_the_valley_floor() {
        let mut builder = ProgramBuilder::new();
        builder.add_free_variables(&[-1.2, 1.0]);
        builder.add_objective(Rosenbrock);
        let (solution, _) = solve(builder);
        assert!(solution.is_converged(), "{:?}", solution.status);
        assert!(solution.stats.optimality <= AlmSettings::default().optimality_tolerance);
        assert!((solution.x[0] - 1.0).abs() < 1e-4);
        assert!((solution.x[1] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zero_time_limit_stops_immediately() {
        let mut builder = ProgramBuilder::new();
        builder.add_free_variables(&[0.5, 0.2]);
        builder
            .add_objective(Offset(vec![(0, 3.0), (1, 4.0)]))
            .add_equality(Circle(1.0));
        let program = builder.build().unwrap();
        let solver = AugmentedLagrangian::new(AlmSettings {
            time_limit: Some(Duration::ZERO),
            ..AlmSettings::default()
        });
        let solution = solver.solve(&program);
        assert_eq!(solution.status, SolveStatus::TimeLimit);
        assert_eq!(solution.stats.inner_iterations, 0);
    }

    #[test]
    fn skyline_and_dense_reach_the_same_point() {
        let build = || {
            let mut builder = ProgramBuilder::new();
            builder.add_free_variables(&[0.5, 0.2]);
            builder
                .add_objective(Offset(vec![(0, 3.0), (1, 4.0)]))
                .add_equality(Circle(1.0));
            builder.build().unwrap()
        };
        let dense = AugmentedLagrangian::new(AlmSettings {
            linear_solver: LinearSolverKind::Dense,
            ..AlmSettings::default()
        })
        .solve(&build());
        let skyline = AugmentedLagrangian::new(AlmSettings {
            linear_solver: LinearSolverKind::Skyline,
            ..AlmSettings::default()
        })
        .solve(&build());
        assert!(dense.is_converged() && skyline.is_converged());
        for (a, b) in dense.x.iter().zip(&skyline.x) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
