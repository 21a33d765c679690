//! Circular-orbit helpers and the capture-orbit terminal condition.
use nalgebra::{Matrix3x4, Vector3};
use thiserror::Error;
use transfer_core::{Body, State, Vector2, state, vector};

/// Speed of a circular orbit of `radius` around a body with parameter `mu`.
pub fn circular_speed(mu: f64, radius: f64) -> f64 {
    (mu / radius).sqrt()
}

/// Sense of rotation around the target body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrbitDirection {
    #[default]
    CounterClockwise,
    Clockwise,
}

impl OrbitDirection {
    /// +1 for counter-clockwise, -1 for clockwise.
    pub fn sign(self) -> f64 {
        match self {
            OrbitDirection::CounterClockwise => 1.0,
            OrbitDirection::Clockwise => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrbitError {
    #[error("orbit radius must be positive and finite (got {0})")]
    InvalidRadius(f64),
    #[error("gravitational parameter must be positive and finite (got {0})")]
    InvalidMu(f64),
}

/// Circular orbit the rocket must be inserted into.
///
/// The terminal condition is the whole circle, not a single point: a state is
/// on target when its distance from the centre equals the radius and its
/// velocity is tangential, at circular speed, in the chosen direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOrbit {
    center: Vector2,
    mu: f64,
    radius: f64,
    direction: OrbitDirection,
}

/// How far a state is from being on the target orbit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionReport {
    pub radius: f64,
    pub radius_error: f64,
    pub speed: f64,
    pub speed_error: f64,
    /// Velocity component along the radius vector (zero on a circular orbit).
    pub radial_speed: f64,
    /// True when the angular momentum has the sign of the requested direction.
    pub direction_ok: bool,
}

impl InsertionReport {
    pub fn within(&self, tolerance: f64) -> bool {
        self.radius_error.abs() <= tolerance
            && self.speed_error.abs() <= tolerance
            && self.radial_speed.abs() <= tolerance
            && self.direction_ok
    }
}

impl TargetOrbit {
    pub fn new(
        center: Vector2,
        mu: f64,
        radius: f64,
        direction: OrbitDirection,
    ) -> Result<Self, OrbitError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(OrbitError::InvalidRadius(radius));
        }
        if !(mu.is_finite() && mu > 0.0) {
            return Err(OrbitError::InvalidMu(mu));
        }
        Ok(Self {
            center,
            mu,
            radius,
            direction,
        })
    }

    /// Orbit of `radius` around `body`.
    pub fn around(body: &Body, radius: f64, direction: OrbitDirection) -> Result<Self, OrbitError> {
        Self::new(body.position, body.mu, radius, direction)
    }

    pub fn center(&self) -> &Vector2 {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn direction(&self) -> OrbitDirection {
        self.direction
    }

    /// Circular speed on this orbit.
    pub fn speed(&self) -> f64 {
        circular_speed(self.mu, self.radius)
    }

    /// Signed angular rate, positive counter-clockwise.
    pub fn angular_rate(&self) -> f64 {
        self.direction.sign() * (self.mu / self.radius.powi(3)).sqrt()
    }

    /// On-orbit state at polar `angle` (radians) measured from +x.
    pub fn reference_state(&self, angle: f64) -> State {
        let offset = Vector2::new(angle.cos(), angle.sin()) * self.radius;
        let velocity = vector::perp(&offset) * self.angular_rate();
        state::from_parts(&(self.center + offset), &velocity)
    }

    /// On-orbit state at the circle point nearest to `point`.
    pub fn reference_state_facing(&self, point: &Vector2) -> State {
        let offset = point - self.center;
        let angle = if offset.norm() > 0.0 {
            offset.y.atan2(offset.x)
        } else {
            std::f64::consts::FRAC_PI_2
        };
        self.reference_state(angle)
    }

    /// Terminal residuals, all zero exactly on the orbit:
    /// `[(|p|^2 - r^2) / 2r, vx + w*py, vy - w*px]` with `p` relative to the centre.
    pub fn residuals(&self, x: &State) -> Vector3<f64> {
        let p = state::position(x) - self.center;
        let w = self.angular_rate();
        Vector3::new(
            (p.norm_squared() - self.radius * self.radius) / (2.0 * self.radius),
            x[2] + w * p.y,
            x[3] - w * p.x,
        )
    }

    /// Jacobian of [`Self::residuals`] with respect to the state.
    pub fn residual_jacobian(&self, x: &State) -> Matrix3x4<f64> {
        let p = state::position(x) - self.center;
        let w = self.angular_rate();
        Matrix3x4::new(
            p.x / self.radius,
            p.y / self.radius,
            0.0,
            0.0,
            0.0,
            w,
            1.0,
            0.0,
            -w,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Distance, speed and tangency errors of `x` with respect to this orbit.
    pub fn insertion_report(&self, x: &State) -> InsertionReport {
        let p = state::position(x) - self.center;
        let v = state::velocity(x);
        let radius = p.norm();
        let speed = v.norm();
        let radial_speed = if radius > 0.0 { p.dot(&v) / radius } else { speed };
        InsertionReport {
            radius,
            radius_error: radius - self.radius,
            speed,
            speed_error: speed - self.speed(),
            radial_speed,
            direction_ok: vector::cross(&p, &v) * self.direction.sign() > 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orbit() -> TargetOrbit {
        TargetOrbit::new(Vector2::new(2.5, 0.1), 0.98, 0.5, OrbitDirection::CounterClockwise)
            .unwrap()
    }

    #[test]
    fn reference_states_satisfy_residuals() {
        let orbit = orbit();
        for k in 0..8 {
            let x = orbit.reference_state(k as f64 * 0.7);
            assert!(orbit.residuals(&x).norm() < 1e-12);
            assert!(orbit.insertion_report(&x).within(1e-12));
        }
    }

    #[test]
    fn residual_jacobian_matches_finite_differences() {
        let orbit = orbit();
        let x = State::new(2.9, 0.5, -0.3, 1.1);
        let jac = orbit.residual_jacobian(&x);
        let eps = 1e-6;
        for col in 0..4 {
            let mut p = x;
            let mut m = x;
            p[col] += eps;
            m[col] -= eps;
            let fd = (orbit.residuals(&p) - orbit.residuals(&m)) / (2.0 * eps);
            for row in 0..3 {
                assert!((fd[row] - jac[(row, col)]).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn clockwise_orbit_rejects_counter_clockwise_state() {
        let ccw = orbit();
        let cw = TargetOrbit::new(Vector2::new(2.5, 0.1), 0.98, 0.5, OrbitDirection::Clockwise)
            .unwrap();
        let x = ccw.reference_state(0.3);
        assert!(!cw.insertion_report(&x).direction_ok);
        assert!(cw.residuals(&x).norm() > 1.0);
    }
}
