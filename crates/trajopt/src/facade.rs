//! Re-exported APIs for consumers of the trajectory optimizer.

use transfer_core::{State, Trajectory, World};

pub use crate::request::{FuelPolicy, InitialGuess, InputError, TransferOptions, TransferRequest};
pub use crate::solve::{Attempt, SolvedTransfer, TransferError};
pub use crate::transcription::{FormulatedTransfer, formulate};
pub use crate::verify::{Check, TransferReport, verify};
pub use transfer_dynamics::Collocation;
pub use transfer_nlp::{AlmSettings, LinearSolverKind, SolveStats, SolveStatus};
pub use transfer_orbits::OrbitDirection;

/// Formulate and solve `request` in `world`.
pub fn plan_transfer(world: &World, request: &TransferRequest) -> Result<SolvedTransfer, TransferError> {
    crate::solve::solve(world, request)
}

/// Fuel-efficient transfer from `state_initial` into the standard target orbit,
/// arriving between `minimum_time` and `maximum_time`.
pub fn compute_trajectory_to_other_world(
    state_initial: State,
    minimum_time: f64,
    maximum_time: f64,
) -> Result<Trajectory, TransferError> {
    let request = TransferRequest::new(state_initial, minimum_time, maximum_time);
    Ok(plan_transfer(&World::standard(), &request)?.trajectory)
}

pub mod world {
    use thiserror::Error;
    use transfer_config::{BodyConfig, WorldConfig};
    use transfer_core::{Body, Vector2, World};

    /// Errors surfaced when converting world definitions.
    #[derive(Debug, Error, PartialEq)]
    pub enum WorldError {
        #[error("body '{name}' must have a positive finite mass (got {mass})")]
        InvalidMass { name: String, mass: f64 },
        #[error("gravitational constant must be positive and finite (got {0})")]
        InvalidGravitationalConstant(f64),
        #[error("bodies '{0}' and '{1}' share a position")]
        Coincident(String, String),
    }

    fn body(config: &BodyConfig, g: f64) -> Result<Body, WorldError> {
        if !(config.mass.is_finite() && config.mass > 0.0) {
            return Err(WorldError::InvalidMass {
                name: config.name.clone(),
                mass: config.mass,
            });
        }
        let [x, y] = config.position;
        Ok(Body::from_mass(config.name.clone(), Vector2::new(x, y), config.mass, g))
    }

    /// Convert a `WorldConfig` into the runtime `World`.
    pub fn from_config(config: &WorldConfig) -> Result<World, WorldError> {
        let g = config.gravitational_constant;
        if !(g.is_finite() && g > 0.0) {
            return Err(WorldError::InvalidGravitationalConstant(g));
        }
        let origin = body(&config.origin, g)?;
        let destination = body(&config.destination, g)?;
        if origin.position == destination.position {
            return Err(WorldError::Coincident(origin.name, destination.name));
        }
        Ok(World::new(origin, destination))
    }
}

pub mod scenario {
    use std::time::Duration;

    use transfer_config::{
        CollocationConfig, DirectionConfig, FuelModeConfig, LinearSolverConfig, ScenarioConfig,
        SolverSettingsConfig, TransferOptionsConfig,
    };
    use transfer_core::State;
    use transfer_dynamics::Collocation;
    use transfer_nlp::{AlmSettings, LinearSolverKind};
    use transfer_orbits::OrbitDirection;

    use crate::request::{FuelPolicy, TransferOptions, TransferRequest};

    /// Convert a `ScenarioConfig` into an unvalidated `TransferRequest`.
    pub fn from_config(config: &ScenarioConfig) -> TransferRequest {
        let [x, y, vx, vy] = config.initial_state;
        let mut options = TransferOptions::default();
        apply_options(&mut options, &config.options);
        TransferRequest::new(
            State::new(x, y, vx, vy),
            config.minimum_time,
            config.maximum_time,
        )
        .with_options(options)
    }

    /// Overlay the fields present in `config` onto `options`.
    pub fn apply_options(options: &mut TransferOptions, config: &TransferOptionsConfig) {
        if let Some(knots) = config.knots {
            options.knots = knots;
        }
        if let Some(collocation) = config.collocation {
            options.collocation = match collocation {
                CollocationConfig::Trapezoidal => Collocation::Trapezoidal,
                CollocationConfig::HermiteSimpson => Collocation::HermiteSimpson,
            };
        }
        if let Some(radius) = config.orbit_radius {
            options.orbit_radius = radius;
        }
        if let Some(direction) = config.direction {
            options.direction = match direction {
                DirectionConfig::CounterClockwise => OrbitDirection::CounterClockwise,
                DirectionConfig::Clockwise => OrbitDirection::Clockwise,
            };
        }
        if let Some(mode) = config.fuel_mode {
            options.fuel_policy = fuel_policy(mode);
        }
        if let Some(budget) = config.fuel_budget {
            options.fuel_budget = budget;
        }
        if let Some(k) = config.fuel_coefficient {
            options.fuel_coefficient = k;
        }
        if let Some(weight) = config.time_weight {
            options.time_weight = weight;
        }
        if let Some(clearance) = config.min_clearance {
            options.min_clearance = clearance;
        }
        if let Some(distance) = config.max_distance {
            options.max_distance = distance;
        }
        if config.max_thrust.is_some() {
            options.max_thrust = config.max_thrust;
        }
        if let Some(solver) = &config.solver {
            apply_solver_settings(&mut options.solver, solver);
        }
    }

    pub fn fuel_policy(mode: FuelModeConfig) -> FuelPolicy {
        match mode {
            FuelModeConfig::Constraint => FuelPolicy::Constraint,
            FuelModeConfig::Report => FuelPolicy::Report,
        }
    }

    /// Wall-clock limit from seconds; zero, negative or non-finite means no limit.
    pub fn time_limit(seconds: f64) -> Option<Duration> {
        Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|d| !d.is_zero())
    }

    /// Overlay solver budgets and tolerances; a non-positive time limit clears it.
    pub fn apply_solver_settings(settings: &mut AlmSettings, config: &SolverSettingsConfig) {
        if let Some(n) = config.max_outer_iterations {
            settings.max_outer_iterations = n;
        }
        if let Some(n) = config.max_inner_iterations {
            settings.max_inner_iterations = n;
        }
        if let Some(n) = config.max_total_iterations {
            settings.max_total_iterations = n;
        }
        if let Some(seconds) = config.time_limit_seconds {
            settings.time_limit = time_limit(seconds);
        }
        if let Some(tol) = config.feasibility_tolerance {
            settings.feasibility_tolerance = tol;
        }
        if let Some(tol) = config.optimality_tolerance {
            settings.optimality_tolerance = tol;
        }
        if let Some(penalty) = config.max_penalty {
            settings.max_penalty = penalty;
        }
        if let Some(kind) = config.linear_solver {
            settings.linear_solver = match kind {
                LinearSolverConfig::Auto => LinearSolverKind::Auto,
                LinearSolverConfig::Dense => LinearSolverKind::Dense,
                LinearSolverConfig::Skyline => LinearSolverKind::Skyline,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transfer_config::{BodyConfig, ScenarioConfig, WorldConfig};

    #[test]
    fn world_config_matches_the_standard_world() {
        let config = WorldConfig {
            gravitational_constant: 9.8,
            origin: BodyConfig {
                name: "world_1".into(),
                position: [-2.5, -0.1],
                mass: 0.4,
            },
            destination: BodyConfig {
                name: "world_2".into(),
                position: [2.5, 0.1],
                mass: 0.1,
            },
        };
        assert_eq!(world::from_config(&config), Ok(World::standard()));

        let mut bad = config.clone();
        bad.destination.mass = 0.0;
        assert!(matches!(
            world::from_config(&bad),
            Err(world::WorldError::InvalidMass { .. })
        ));
    }

    #[test]
    fn scenario_overrides_reach_the_request() {
        let text = r#"
name = "report"
initial_state = [-2.0, 0.1, -0.1, 3.0]
minimum_time = 5.0
maximum_time = 15.0

[options]
knots = 40
fuel_mode = "report"
direction = "clockwise"
max_thrust = 4.0

[options.solver]
linear_solver = "skyline"
time_limit_seconds = 0.0
max_outer_iterations = 12
"#;
        let config: ScenarioConfig = toml::from_str(text).unwrap();
        let request = scenario::from_config(&config);
        assert_eq!(request.initial_state, State::new(-2.0, 0.1, -0.1, 3.0));
        assert_eq!(request.options.knots, 40);
        assert_eq!(request.options.fuel_policy, FuelPolicy::Report);
        assert_eq!(request.options.direction, OrbitDirection::Clockwise);
        assert_eq!(request.options.max_thrust, Some(4.0));
        assert_eq!(request.options.solver.linear_solver, LinearSolverKind::Skyline);
        assert_eq!(request.options.solver.time_limit, None);
        assert_eq!(request.options.solver.max_outer_iterations, 12);
        // untouched fields keep their defaults
        assert_eq!(request.options.min_clearance, 0.35);
    }

    #[test]
    fn only_positive_time_limits_are_kept() {
        assert_eq!(scenario::time_limit(0.0), None);
        assert_eq!(scenario::time_limit(-3.0), None);
        assert_eq!(scenario::time_limit(f64::NAN), None);
        assert_eq!(
            scenario::time_limit(2.5),
            Some(std::time::Duration::from_millis(2500))
        );
    }
}
