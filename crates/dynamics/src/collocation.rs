//! Implicit collocation defects used as equality constraints by the optimizer.
//!
//! For a knot pair `(x_a, x_b)` joined by a constant control `u` over a step `h`
//! the transition is dynamically consistent when the defect vanishes.
//!
//! ```text
//! trapezoidal:      d = x_b - x_a - h/2 * (f_a + f_b)
//! Hermite-Simpson:  x_c = (x_a + x_b)/2 + h/8 * (f_a - f_b)
//!                   d = x_b - x_a - h/6 * (f_a + 4 f(x_c, u) + f_b)
//! ```

use nalgebra::{Matrix4, Matrix4x2};
use transfer_core::{Control, State};

use crate::model::Dynamics;

/// Implicit scheme used to link consecutive knots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collocation {
    /// Second-order trapezoidal rule.
    Trapezoidal,
    /// Fourth-order compressed Hermite-Simpson rule.
    #[default]
    HermiteSimpson,
}

/// Partial derivatives of a collocation defect.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectJacobian {
    /// `dd/dx_a`
    pub start: Matrix4<f64>,
    /// `dd/dx_b`
    pub end: Matrix4<f64>,
    /// `dd/du`
    pub control: Matrix4x2<f64>,
    /// `dd/dh`
    pub step: State,
}

impl Collocation {
    /// Defect and Jacobian of one transition.
    pub fn defect_with_jacobian<D: Dynamics + ?Sized>(
        self,
        dynamics: &D,
        start: &State,
        end: &State,
        control: &Control,
        h: f64,
    ) -> (State, DefectJacobian) {
        match self {
            Collocation::Trapezoidal => trapezoid(dynamics, start, end, control, h),
            Collocation::HermiteSimpson => hermite_simpson(dynamics, start, end, control, h),
        }
    }

    /// Defect only, for verification passes that need no derivatives.
    pub fn defect<D: Dynamics + ?Sized>(
        self,
        dynamics: &D,
        start: &State,
        end: &State,
        control: &Control,
        h: f64,
    ) -> State {
        match self {
            Collocation::Trapezoidal => trapezoid_defect(dynamics, start, end, control, h),
            Collocation::HermiteSimpson => {
                hermite_simpson_defect(dynamics, start, end, control, h)
            }
        }
    }
}

/// Defect and Jacobian of one trapezoidal transition.
pub fn trapezoid<D: Dynamics + ?Sized>(
    dynamics: &D,
    start: &State,
    end: &State,
    control: &Control,
    h: f64,
) -> (State, DefectJacobian) {
    let f_start = dynamics.derivative(start, control);
    let f_end = dynamics.derivative(end, control);
    let half = 0.5 * h;
    let defect = end - start - (f_start + f_end) * half;

    let identity = Matrix4::<f64>::identity();
    let jacobian = DefectJacobian {
        start: -identity - dynamics.state_jacobian(start, control) * half,
        end: identity - dynamics.state_jacobian(end, control) * half,
        control: -(dynamics.control_jacobian(start, control)
            + dynamics.control_jacobian(end, control))
            * half,
        step: -(f_start + f_end) * 0.5,
    };
    (defect, jacobian)
}

pub fn trapezoid_defect<D: Dynamics + ?Sized>(
    dynamics: &D,
    start: &State,
    end: &State,
    control: &Control,
    h: f64,
) -> State {
    let f_start = dynamics.derivative(start, control);
    let f_end = dynamics.derivative(end, control);
    end - start - (f_start + f_end) * (0.5 * h)
}

/// Defect and Jacobian of one Hermite-Simpson transition.
pub fn hermite_simpson<D: Dynamics + ?Sized>(
    dynamics: &D,
    start: &State,
    end: &State,
    control: &Control,
    h: f64,
) -> (State, DefectJacobian) {
    let f_start = dynamics.derivative(start, control);
    let f_end = dynamics.derivative(end, control);
    let mid = (start + end) * 0.5 + (f_start - f_end) * (h / 8.0);
    let f_mid = dynamics.derivative(&mid, control);
    let defect = end - start - (f_start + f_mid * 4.0 + f_end) * (h / 6.0);

    let identity = Matrix4::<f64>::identity();
    let a_start = dynamics.state_jacobian(start, control);
    let a_end = dynamics.state_jacobian(end, control);
    let a_mid = dynamics.state_jacobian(&mid, control);
    let b_start = dynamics.control_jacobian(start, control);
    let b_end = dynamics.control_jacobian(end, control);
    let b_mid = dynamics.control_jacobian(&mid, control);

    // chain rule through the interpolated midpoint
    let mid_start = identity * 0.5 + a_start * (h / 8.0);
    let mid_end = identity * 0.5 - a_end * (h / 8.0);
    let mid_control = (b_start - b_end) * (h / 8.0);
    let mid_step = (f_start - f_end) / 8.0;

    let sixth = h / 6.0;
    let jacobian = DefectJacobian {
        start: -identity - (a_start + a_mid * mid_start * 4.0) * sixth,
        end: identity - (a_end + a_mid * mid_end * 4.0) * sixth,
        control: -(b_start + (a_mid * mid_control + b_mid) * 4.0 + b_end) * sixth,
        step: -(f_start + f_mid * 4.0 + f_end) / 6.0 - a_mid * mid_step * (4.0 * sixth),
    };
    (defect, jacobian)
}

pub fn hermite_simpson_defect<D: Dynamics + ?Sized>(
    dynamics: &D,
    start: &State,
    end: &State,
    control: &Control,
    h: f64,
) -> State {
    let f_start = dynamics.derivative(start, control);
    let f_end = dynamics.derivative(end, control);
    let mid = (start + end) * 0.5 + (f_start - f_end) * (h / 8.0);
    let f_mid = dynamics.derivative(&mid, control);
    end - start - (f_start + f_mid * 4.0 + f_end) * (h / 6.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::rk4_step;
    use crate::model::RocketDynamics;
    use transfer_core::{Body, Vector2, World};

    fn check_jacobian(scheme: Collocation) {
        let model = RocketDynamics::default();
        let xa = State::new(-1.9, 0.4, 0.2, 2.5);
        let xb = State::new(-1.8, 0.6, 0.1, 2.2);
        let u = Control::new(0.3, -0.4);
        let h = 0.07;
        let (_, jac) = scheme.defect_with_jacobian(&model, &xa, &xb, &u, h);
        let d = |a: &State, b: &State, u: &Control, h: f64| scheme.defect(&model, a, b, u, h);
        let eps = 1e-6;

        for col in 0..4 {
            let mut p = xa;
            let mut m = xa;
            p[col] += eps;
            m[col] -= eps;
            let fd = (d(&p, &xb, &u, h) - d(&m, &xb, &u, h)) / (2.0 * eps);
            for row in 0..4 {
                assert!((fd[row] - jac.start[(row, col)]).abs() < 1e-6, "{scheme:?} start");
            }

            let mut p = xb;
            let mut m = xb;
            p[col] += eps;
            m[col] -= eps;
            let fd = (d(&xa, &p, &u, h) - d(&xa, &m, &u, h)) / (2.0 * eps);
            for row in 0..4 {
                assert!((fd[row] - jac.end[(row, col)]).abs() < 1e-6, "{scheme:?} end");
            }
        }

        for col in 0..2 {
            let mut p = u;
            let mut m = u;
            p[col] += eps;
            m[col] -= eps;
            let fd = (d(&xa, &xb, &p, h) - d(&xa, &xb, &m, h)) / (2.0 * eps);
            for row in 0..4 {
                assert!((fd[row] - jac.control[(row, col)]).abs() < 1e-6, "{scheme:?} control");
            }
        }

        let fd = (d(&xa, &xb, &u, h + eps) - d(&xa, &xb, &u, h - eps)) / (2.0 * eps);
        assert!((fd - jac.step).norm() < 1e-6, "{scheme:?} step");
    }

    #[test]
    fn trapezoid_jacobian_matches_finite_differences() {
        check_jacobian(Collocation::Trapezoidal);
    }

    #[test]
    fn hermite_simpson_jacobian_matches_finite_differences() {
        check_jacobian(Collocation::HermiteSimpson);
    }

    #[test]
    fn defect_vanishes_for_uniform_motion_far_from_bodies() {
        let model = RocketDynamics::new(World::new(
            Body::new("a", Vector2::new(-1.0e6, 0.0), 0.0),
            Body::new("b", Vector2::new(1.0e6, 0.0), 0.0),
        ));
        let xa = State::new(0.0, 0.0, 1.0, 2.0);
        let xb = State::new(0.5, 1.0, 1.0, 2.0);
        for scheme in [Collocation::Trapezoidal, Collocation::HermiteSimpson] {
            let d = scheme.defect(&model, &xa, &xb, &Control::zeros(), 0.5);
            assert!(d.norm() < 1e-12);
        }
    }

    #[test]
    fn hermite_simpson_is_closer_to_rk4_than_trapezoid() {
        let model = RocketDynamics::default();
        let xa = State::new(-2.0, 0.1, 0.1, 3.0);
        let u = Control::new(0.1, -0.2);
        let h = 0.1;
        let xb = rk4_step(&model, &xa, &u, h);
        let trap = Collocation::Trapezoidal.defect(&model, &xa, &xb, &u, h).norm();
        let hs = Collocation::HermiteSimpson.defect(&model, &xa, &xb, &u, h).norm();
        assert!(hs < trap, "hs = {hs}, trap = {trap}");
    }
}
