//! Builder and immutable representation of a nonlinear program.

use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::rows::Rows;

/// A vector-valued function of the decision variables.
///
/// Implementors append exactly [`Function::rows`] rows to `out`, each with its
/// value and the non-zero partial derivatives with respect to the variables.
pub trait Function: Send + Sync {
    /// Number of rows produced per evaluation.
    fn rows(&self) -> usize;

    /// Length of the variable vector `evaluate` indexes into.
    fn columns(&self) -> usize;

    /// Append values and gradient rows evaluated at `x`.
    fn evaluate(&self, x: &[f64], out: &mut Rows);

    /// Label used in diagnostics.
    fn name(&self) -> &str {
        "function"
    }
}

/// Continuous decision variable with box bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable {
    pub lower: f64,
    pub upper: f64,
    pub initial: f64,
}

impl Variable {
    pub fn free(initial: f64) -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            initial,
        }
    }

    pub fn bounded(lower: f64, upper: f64, initial: f64) -> Self {
        Self {
            lower,
            upper,
            initial,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProgramError {
    #[error("program has no variables")]
    NoVariables,
    #[error("variable {index} has lower bound {lower} above upper bound {upper}")]
    InvertedBounds { index: usize, lower: f64, upper: f64 },
    #[error("variable {index} has a non-finite initial value")]
    NonFiniteInitial { index: usize },
    #[error("{function} declares {declared} rows but produced {produced}")]
    RowCount {
        function: String,
        declared: usize,
        produced: usize,
    },
    #[error("{function} references variable {column} but the program has {variables}")]
    ColumnOutOfRange {
        function: String,
        column: usize,
        variables: usize,
    },
}

/// Mutable accumulator of variables, constraints and objective terms.
#[derive(Default)]
pub struct ProgramBuilder {
    variables: Vec<Variable>,
    equalities: Vec<Box<dyn Function>>,
    inequalities: Vec<Box<dyn Function>>,
    objective: Vec<Box<dyn Function>>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one variable and return its index.
    pub fn add_variable(&mut self, variable: Variable) -> usize {
        self.variables.push(variable);
        self.variables.len() - 1
    }

    /// Add a contiguous block of unbounded variables seeded from `initial`.
    pub fn add_free_variables(&mut self, initial: &[f64]) -> Range<usize> {
        let start = self.variables.len();
        self.variables
            .extend(initial.iter().map(|&v| Variable::free(v)));
        start..self.variables.len()
    }

    /// Constraint block `c(x) == 0`.
    pub fn add_equality(&mut self, function: impl Function + 'static) -> &mut Self {
        self.equalities.push(Box::new(function));
        self
    }

    /// Constraint block `g(x) <= 0`.
    pub fn add_inequality(&mut self, function: impl Function + 'static) -> &mut Self {
        self.inequalities.push(Box::new(function));
        self
    }

    /// Least-squares objective term contributing `0.5 * sum(r^2)`.
    pub fn add_objective(&mut self, function: impl Function + 'static) -> &mut Self {
        self.objective.push(Box::new(function));
        self
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Validate and freeze the program.
    ///
    /// Every block must fit within the declared variables; it is then
    /// evaluated once at the initial point to check its row count and the
    /// columns of its gradient entries.
    pub fn build(self) -> Result<Program, ProgramError> {
        if self.variables.is_empty() {
            return Err(ProgramError::NoVariables);
        }
        for (index, v) in self.variables.iter().enumerate() {
            if v.lower > v.upper || v.lower.is_nan() || v.upper.is_nan() {
                return Err(ProgramError::InvertedBounds {
                    index,
                    lower: v.lower,
                    upper: v.upper,
                });
            }
            if !v.initial.is_finite() {
                return Err(ProgramError::NonFiniteInitial { index });
            }
        }

        let program = Program {
            variables: self.variables,
            equality_rows: self.equalities.iter().map(|f| f.rows()).sum(),
            inequality_rows: self.inequalities.iter().map(|f| f.rows()).sum(),
            equalities: self.equalities,
            inequalities: self.inequalities,
            objective: self.objective,
        };
        let x0 = program.initial_point();
        for block in program
            .equalities
            .iter()
            .chain(&program.inequalities)
            .chain(&program.objective)
        {
            program.check_block(block.as_ref(), &x0)?;
        }
        Ok(program)
    }
}

/// Immutable nonlinear program: minimize `0.5 * sum(r_obj^2)` subject to
/// `c(x) == 0`, `g(x) <= 0` and `lower <= x <= upper`.
pub struct Program {
    variables: Vec<Variable>,
    equalities: Vec<Box<dyn Function>>,
    inequalities: Vec<Box<dyn Function>>,
    objective: Vec<Box<dyn Function>>,
    equality_rows: usize,
    inequality_rows: usize,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("variables", &self.variables.len())
            .field("equality_rows", &self.equality_rows)
            .field("inequality_rows", &self.inequality_rows)
            .field("objective_terms", &self.objective.len())
            .finish()
    }
}

impl Program {
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn equality_count(&self) -> usize {
        self.equality_rows
    }

    pub fn inequality_count(&self) -> usize {
        self.inequality_rows
    }

    pub fn initial_point(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.initial).collect()
    }

    pub fn lower_bounds(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.lower).collect()
    }

    pub fn upper_bounds(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.upper).collect()
    }

    /// Clamp `x` into the variable box.
    pub fn project(&self, x: &mut [f64]) {
        for (value, v) in x.iter_mut().zip(&self.variables) {
            *value = value.clamp(v.lower, v.upper);
        }
    }

    pub fn evaluate_equalities(&self, x: &[f64], out: &mut Rows) {
        out.clear();
        for f in &self.equalities {
            f.evaluate(x, out);
        }
    }

    pub fn evaluate_inequalities(&self, x: &[f64], out: &mut Rows) {
        out.clear();
        for f in &self.inequalities {
            f.evaluate(x, out);
        }
    }

    pub fn evaluate_objective(&self, x: &[f64], out: &mut Rows) {
        out.clear();
        for f in &self.objective {
            f.evaluate(x, out);
        }
    }

    /// Objective value `0.5 * sum(r^2)` at `x`.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        let mut rows = Rows::new();
        self.evaluate_objective(x, &mut rows);
        0.5 * rows.squared_norm()
    }

    /// Largest constraint violation at `x` (equalities in absolute value,
    /// inequalities by their positive part, bounds by their excess).
    pub fn violation(&self, x: &[f64]) -> f64 {
        let mut rows = Rows::new();
        self.evaluate_equalities(x, &mut rows);
        let eq = rows.values().iter().fold(0.0_f64, |m, c| m.max(c.abs()));
        self.evaluate_inequalities(x, &mut rows);
        let ineq = rows.values().iter().fold(0.0_f64, |m, &g| m.max(g));
        let bounds = x
            .iter()
            .zip(&self.variables)
            .fold(0.0_f64, |m, (&value, v)| {
                m.max(v.lower - value).max(value - v.upper)
            });
        eq.max(ineq).max(bounds)
    }

    fn check_block(&self, block: &dyn Function, x: &[f64]) -> Result<(), ProgramError> {
        if block.columns() > self.variables.len() {
            return Err(ProgramError::ColumnOutOfRange {
                function: block.name().to_string(),
                column: block.columns() - 1,
                variables: self.variables.len(),
            });
        }
        let mut rows = Rows::new();
        block.evaluate(x, &mut rows);
        if rows.len() != block.rows() {
            return Err(ProgramError::RowCount {
                function: block.name().to_string(),
                declared: block.rows(),
                produced: rows.len(),
            });
        }
        match rows.max_column() {
            Some(column) if column >= self.variables.len() => {
                Err(ProgramError::ColumnOutOfRange {
                    function: block.name().to_string(),
                    column,
                    variables: self.variables.len(),
                })
            }
            _ => Ok(()),
        }
    }
}
