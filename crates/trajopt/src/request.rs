//! What the caller asks for: initial state, time window and transcription options.

use thiserror::Error;
use transfer_core::{ShapeError, State, Trajectory, World, constants, state};
use transfer_dynamics::Collocation;
use transfer_nlp::AlmSettings;
use transfer_orbits::{OrbitDirection, OrbitError, TargetOrbit};

/// How the fuel budget takes part in the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuelPolicy {
    /// `k * h * sum(|u|^2) <= budget` is a hard inequality.
    #[default]
    Constraint,
    /// Fuel is only minimized; the budget is checked and reported afterwards.
    Report,
}

/// Transcription and solver options.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOptions {
    /// Number of intervals `N`; the trajectory has `N + 1` knots.
    pub knots: usize,
    pub collocation: Collocation,
    pub orbit_radius: f64,
    pub direction: OrbitDirection,
    pub fuel_policy: FuelPolicy,
    pub fuel_budget: f64,
    pub fuel_coefficient: f64,
    /// Weight `w` of the `0.5 * w * (T - minimum_time)^2` objective term.
    pub time_weight: f64,
    /// Lower bound on the distance from every body at each free knot.
    pub min_clearance: f64,
    /// Upper bound on the distance from the origin at each free knot.
    pub max_distance: f64,
    /// Optional cap on `|u|` at every interval.
    pub max_thrust: Option<f64>,
    /// Largest collocation defect component accepted by verification.
    pub defect_tolerance: f64,
    pub solver: AlmSettings,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            knots: 80,
            collocation: Collocation::HermiteSimpson,
            orbit_radius: constants::TARGET_ORBIT_RADIUS,
            direction: OrbitDirection::CounterClockwise,
            fuel_policy: FuelPolicy::Constraint,
            fuel_budget: constants::FUEL_BUDGET,
            fuel_coefficient: constants::FUEL_COEFFICIENT,
            time_weight: 1e-3,
            min_clearance: 0.35,
            max_distance: 10.0,
            max_thrust: None,
            defect_tolerance: 1e-3,
            solver: AlmSettings::default(),
        }
    }
}

/// Seed of the nonlinear search.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InitialGuess {
    /// Straight chord from the initial position to the target circle.
    #[default]
    StraightLine,
    /// Resample a previous trajectory onto the knot grid.
    WarmStart(Trajectory),
}

/// Inputs rejected before any program is built.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("time window must satisfy 0 < minimum <= maximum (got [{minimum}, {maximum}])")]
    InvalidWindow { minimum: f64, maximum: f64 },
    #[error("initial state must be finite")]
    NonFiniteState,
    #[error("initial state coincides with body '{0}'")]
    StateAtBody(String),
    #[error("at least 2 knot intervals are required (got {0})")]
    TooFewKnots(usize),
    #[error("{name} must be positive and finite (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be non-negative and finite (got {value})")]
    Negative { name: &'static str, value: f64 },
    #[error("invalid target orbit: {0}")]
    Orbit(#[from] OrbitError),
    #[error("warm start trajectory is unusable: {0}")]
    WarmStart(#[from] ShapeError),
    #[error("warm start trajectory must hold at least two samples")]
    WarmStartTooShort,
}

/// An unformulated transfer: where the rocket starts and how long it may fly.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub initial_state: State,
    pub minimum_time: f64,
    pub maximum_time: f64,
    pub options: TransferOptions,
    pub initial_guess: InitialGuess,
}

impl TransferRequest {
    pub fn new(initial_state: State, minimum_time: f64, maximum_time: f64) -> Self {
        Self {
            initial_state,
            minimum_time,
            maximum_time,
            options: TransferOptions::default(),
            initial_guess: InitialGuess::StraightLine,
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_warm_start(mut self, trajectory: Trajectory) -> Self {
        self.initial_guess = InitialGuess::WarmStart(trajectory);
        self
    }

    /// True when the window pins the transfer time.
    pub fn fixed_time(&self) -> bool {
        self.minimum_time == self.maximum_time
    }

    /// Target orbit around the destination body of `world`.
    pub fn target_orbit(&self, world: &World) -> Result<TargetOrbit, InputError> {
        Ok(TargetOrbit::around(
            &world.destination,
            self.options.orbit_radius,
            self.options.direction,
        )?)
    }

    /// Check preconditions; nothing is solved for a request that fails here.
    pub fn validate(&self, world: &World) -> Result<(), InputError> {
        let (minimum, maximum) = (self.minimum_time, self.maximum_time);
        if !(minimum.is_finite() && maximum.is_finite() && minimum > 0.0 && minimum <= maximum) {
            return Err(InputError::InvalidWindow { minimum, maximum });
        }
        if !state::is_finite(&self.initial_state) {
            return Err(InputError::NonFiniteState);
        }
        let position = state::position(&self.initial_state);
        if let Some(body) = world
            .bodies()
            .into_iter()
            .find(|body| body.distance_to(&position) == 0.0)
        {
            return Err(InputError::StateAtBody(body.name.clone()));
        }

        let o = &self.options;
        if o.knots < 2 {
            return Err(InputError::TooFewKnots(o.knots));
        }
        positive("fuel budget", o.fuel_budget)?;
        positive("fuel coefficient", o.fuel_coefficient)?;
        positive("maximum distance", o.max_distance)?;
        positive("defect tolerance", o.defect_tolerance)?;
        non_negative("time weight", o.time_weight)?;
        non_negative("minimum clearance", o.min_clearance)?;
        if let Some(cap) = o.max_thrust {
            positive("maximum thrust", cap)?;
        }
        self.target_orbit(world)?;

        if let InitialGuess::WarmStart(trajectory) = &self.initial_guess {
            if trajectory.len() < 2 {
                return Err(InputError::WarmStartTooShort);
            }
            if !trajectory.states().iter().all(state::is_finite) {
                return Err(InputError::NonFiniteState);
            }
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InputError::NonPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InputError::Negative { name, value })
    }
}
