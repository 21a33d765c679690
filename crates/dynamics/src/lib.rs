//! Point-mass rocket dynamics under two fixed gravitating bodies.
//!
//! The [`model`] module evaluates the state derivative and its Jacobians,
//! [`integrator`] advances states with explicit fixed-step schemes,
//! [`collocation`] provides the implicit trapezoidal and Hermite-Simpson
//! defects used as equality constraints by the optimizer, and [`simulate`]
//! replays control tapes over a time grid.

pub mod collocation;
pub mod fuel;
pub mod integrator;
pub mod model;
pub mod simulate;

pub use collocation::{Collocation, DefectJacobian};
pub use fuel::{fuel_consumption, fuel_used};
pub use integrator::Scheme;
pub use model::{Dynamics, RocketDynamics};
pub use simulate::{
    SimulationError, Simulator, simulate_states_over_time, simulate_states_over_time_passive,
};
