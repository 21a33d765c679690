//! State derivative of the thrusting point mass.

use nalgebra::{Matrix2, Matrix4, Matrix4x2};
use transfer_core::{Control, State, Vector2, World, state};

/// A continuous-time model `x' = f(x, u)` with analytic first derivatives.
pub trait Dynamics {
    /// State derivative for the given state and control.
    fn derivative(&self, state: &State, control: &Control) -> State;

    /// `df/dx` evaluated at `(state, control)`.
    fn state_jacobian(&self, state: &State, control: &Control) -> Matrix4<f64>;

    /// `df/du`; thrust enters the velocity rows directly.
    fn control_jacobian(&self, _state: &State, _control: &Control) -> Matrix4x2<f64> {
        let mut b = Matrix4x2::zeros();
        b[(2, 0)] = 1.0;
        b[(3, 1)] = 1.0;
        b
    }
}

impl<D: Dynamics + ?Sized> Dynamics for &D {
    fn derivative(&self, state: &State, control: &Control) -> State {
        (**self).derivative(state, control)
    }

    fn state_jacobian(&self, state: &State, control: &Control) -> Matrix4<f64> {
        (**self).state_jacobian(state, control)
    }

    fn control_jacobian(&self, state: &State, control: &Control) -> Matrix4x2<f64> {
        (**self).control_jacobian(state, control)
    }
}

/// Inverse-square gravity from both bodies of a [`World`] plus the commanded acceleration.
///
/// Precondition: the rocket never sits exactly on a body centre; the
/// acceleration is singular there and is not guarded against.
#[derive(Debug, Clone)]
pub struct RocketDynamics {
    world: World,
}

impl RocketDynamics {
    pub fn new(world: World) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Gravitational acceleration at `position`, each term pointing toward its body.
    pub fn gravity(&self, position: &Vector2) -> Vector2 {
        self.world
            .bodies()
            .iter()
            .fold(Vector2::zeros(), |acc, body| {
                let r = position - body.position;
                let d2 = r.norm_squared();
                acc - r * (body.mu / (d2 * d2.sqrt()))
            })
    }

    /// Gradient of [`Self::gravity`] with respect to position.
    pub fn gravity_gradient(&self, position: &Vector2) -> Matrix2<f64> {
        self.world
            .bodies()
            .iter()
            .fold(Matrix2::zeros(), |acc, body| {
                let r = position - body.position;
                let d2 = r.norm_squared();
                let d = d2.sqrt();
                let inv_d3 = 1.0 / (d2 * d);
                let inv_d5 = inv_d3 / d2;
                acc + (r * r.transpose() * (3.0 * inv_d5) - Matrix2::identity() * inv_d3)
                    * body.mu
            })
    }
}

impl Default for RocketDynamics {
    fn default() -> Self {
        Self::new(World::standard())
    }
}

impl Dynamics for RocketDynamics {
    fn derivative(&self, x: &State, u: &Control) -> State {
        let accel = self.gravity(&state::position(x)) + u;
        State::new(x[2], x[3], accel.x, accel.y)
    }

    fn state_jacobian(&self, x: &State, _u: &Control) -> Matrix4<f64> {
        let g = self.gravity_gradient(&state::position(x));
        let mut a = Matrix4::zeros();
        a[(0, 2)] = 1.0;
        a[(1, 3)] = 1.0;
        a.fixed_view_mut::<2, 2>(2, 0).copy_from(&g);
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> State {
        State::new(-1.3, 0.7, 0.4, -0.2)
    }

    #[test]
    fn derivative_passes_velocity_and_adds_thrust() {
        let model = RocketDynamics::default();
        let x = sample_state();
        let coast = model.derivative(&x, &Control::zeros());
        let burn = model.derivative(&x, &Control::new(0.5, -1.0));
        assert_eq!(coast[0], 0.4);
        assert_eq!(coast[1], -0.2);
        assert!((burn[2] - coast[2] - 0.5).abs() < 1e-12);
        assert!((burn[3] - coast[3] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn gravity_points_toward_single_body() {
        let world = World::standard();
        let model = RocketDynamics::new(world.clone());
        // just beside the origin world, its pull dominates
        let position = world.origin.position + Vector2::new(0.3, 0.0);
        let g = model.gravity(&position);
        assert!(g.x < 0.0);
        let expected = world.origin.mu / 0.09;
        assert!((g.x.abs() - expected).abs() / expected < 0.01);
    }

    #[test]
    fn state_jacobian_matches_finite_differences() {
        let model = RocketDynamics::default();
        let x = sample_state();
        let u = Control::new(0.1, 0.2);
        let analytic = model.state_jacobian(&x, &u);
        let eps = 1e-6;
        for col in 0..4 {
            let mut plus = x;
            let mut minus = x;
            plus[col] += eps;
            minus[col] -= eps;
            let fd = (model.derivative(&plus, &u) - model.derivative(&minus, &u)) / (2.0 * eps);
            for row in 0..4 {
                assert!(
                    (fd[row] - analytic[(row, col)]).abs() < 1e-5,
                    "d f{row} / d x{col}: fd {} vs analytic {}",
                    fd[row],
                    analytic[(row, col)]
                );
            }
        }
    }
}
