//! Direct transcription of a transfer request into a nonlinear program.
//!
//! The controls are piecewise constant on `N` uniform intervals and the knot
//! states are linked by implicit collocation defects. Terminal insertion, body
//! clearance, containment and the optional thrust cap and fuel budget become
//! equality and inequality blocks; fuel and a light time preference form the
//! least-squares objective.

pub mod blocks;
pub mod guess;
pub mod layout;

use tracing::debug;
use transfer_core::{Trajectory, World, vector};
use transfer_dynamics::RocketDynamics;
use transfer_nlp::{Program, ProgramBuilder, Variable};
use transfer_orbits::TargetOrbit;

use crate::request::{FuelPolicy, InitialGuess, TransferRequest};
use crate::solve::TransferError;
use blocks::{
    Clearance, Containment, DynamicsDefects, FuelBudget, FuelObjective, TerminalOrbit, ThrustCap,
    TimeObjective,
};
use layout::Layout;

/// A validated request together with its nonlinear program.
#[derive(Debug)]
pub struct FormulatedTransfer {
    pub request: TransferRequest,
    pub world: World,
    pub layout: Layout,
    pub orbit: TargetOrbit,
    pub program: Program,
}

impl FormulatedTransfer {
    /// Rebuild the knot trajectory from a decision vector.
    pub fn trajectory(&self, x: &[f64]) -> Result<Trajectory, transfer_core::ShapeError> {
        let layout = &self.layout;
        let n = layout.intervals();
        let states = (0..=n).map(|k| layout.state(x, k)).collect();
        let controls = (0..n).map(|i| layout.control(x, i)).collect();
        let times = vector::linspace(0.0, layout.duration(x), n + 1);
        Trajectory::new(states, controls, times)
    }
}

/// Validate `request` and build its program.
pub fn formulate(world: &World, request: &TransferRequest) -> Result<FormulatedTransfer, TransferError> {
    request.validate(world)?;
    let options = &request.options;
    let orbit = request.target_orbit(world)?;
    let n = options.knots;

    let layout = if request.fixed_time() {
        Layout::fixed_time(n, request.initial_state, request.minimum_time)
    } else {
        Layout::free_time(n, request.initial_state)
    };
    let midpoint = 0.5 * (request.minimum_time + request.maximum_time);
    let x0 = match &request.initial_guess {
        InitialGuess::StraightLine => guess::straight_line(&layout, &orbit, midpoint),
        InitialGuess::WarmStart(trajectory) => guess::warm_start(
            &layout,
            trajectory,
            request.minimum_time,
            request.maximum_time,
        ),
    };

    let mut builder = ProgramBuilder::new();
    let time_column = layout.time_column();
    for (column, &initial) in x0.iter().enumerate() {
        let variable = if Some(column) == time_column {
            Variable::bounded(request.minimum_time, request.maximum_time, initial)
        } else {
            Variable::free(initial)
        };
        builder.add_variable(variable);
    }

    let dynamics = RocketDynamics::new(world.clone());
    builder
        .add_equality(DynamicsDefects {
            layout: layout.clone(),
            dynamics,
            scheme: options.collocation,
        })
        .add_equality(TerminalOrbit {
            layout: layout.clone(),
            orbit: orbit.clone(),
        })
        .add_inequality(Clearance {
            layout: layout.clone(),
            centers: world.bodies().iter().map(|b| b.position).collect(),
            clearance: options.min_clearance,
        })
        .add_inequality(Containment {
            layout: layout.clone(),
            max_distance: options.max_distance,
        });
    if let Some(max_thrust) = options.max_thrust {
        builder.add_inequality(ThrustCap {
            layout: layout.clone(),
            max_thrust,
        });
    }
    if options.fuel_policy == FuelPolicy::Constraint {
        builder.add_inequality(FuelBudget {
            layout: layout.clone(),
            coefficient: options.fuel_coefficient,
            budget: options.fuel_budget,
        });
    }
    builder.add_objective(FuelObjective {
        layout: layout.clone(),
        coefficient: options.fuel_coefficient,
    });
    if time_column.is_some() && options.time_weight > 0.0 {
        builder.add_objective(TimeObjective {
            layout: layout.clone(),
            minimum_time: request.minimum_time,
            weight: options.time_weight,
        });
    }

    let program = builder.build()?;
    debug!(
        knots = n,
        variables = program.variable_count(),
        equalities = program.equality_count(),
        inequalities = program.inequality_count(),
        free_time = time_column.is_some(),
        "formulated transfer program"
    );

    Ok(FormulatedTransfer {
        request: request.clone(),
        world: world.clone(),
        layout,
        orbit,
        program,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InputError;
    use transfer_core::State;

    #[test]
    fn program_sizes_follow_the_knot_count() {
        let world = World::standard();
        let mut request = TransferRequest::new(State::new(-2.0, 0.1, 0.1, 3.0), 5.0, 15.0);
        request.options.knots = 10;
        let formulated = formulate(&world, &request).unwrap();
        let program = &formulated.program;
        assert_eq!(program.variable_count(), 61);
        assert_eq!(program.equality_count(), 4 * 10 + 3);
        // clearance for two bodies, containment, fuel budget
        assert_eq!(program.inequality_count(), 20 + 10 + 1);
        assert_eq!(program.lower_bounds()[60], 5.0);
        assert_eq!(program.upper_bounds()[60], 15.0);
    }

    #[test]
    fn fixed_window_pins_the_duration() {
        let world = World::standard();
        let mut request = TransferRequest::new(State::new(-2.0, 0.1, 0.1, 3.0), 8.0, 8.0);
        request.options.knots = 10;
        request.options.max_thrust = Some(3.0);
        let formulated = formulate(&world, &request).unwrap();
        assert_eq!(formulated.program.variable_count(), 60);
        assert_eq!(formulated.program.inequality_count(), 20 + 10 + 10 + 1);
        let trajectory = formulated
            .trajectory(&formulated.program.initial_point())
            .unwrap();
        assert_eq!(trajectory.duration(), 8.0);
        assert_eq!(trajectory.initial_state(), &request.initial_state);
    }

    #[test]
    fn invalid_requests_never_reach_the_builder() {
        let world = World::standard();
        let request = TransferRequest::new(State::new(-2.0, 0.1, 0.1, 3.0), 15.0, 5.0);
        assert!(matches!(
            formulate(&world, &request),
            Err(TransferError::InvalidInput(InputError::InvalidWindow { .. }))
        ));
    }
}
