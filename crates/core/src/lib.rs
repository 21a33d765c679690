//! Core constants, state types, and shared primitives for the World Transfer workspace.

mod trajectory;
mod world;

pub use trajectory::{ShapeError, Trajectory};
pub use world::{Body, World};

/// Planar rocket state `(x, y, vx, vy)`.
pub type State = nalgebra::Vector4<f64>;

/// Commanded acceleration `(ax, ay)` along the two booster axes.
pub type Control = nalgebra::Vector2<f64>;

/// Planar position or velocity.
pub type Vector2 = nalgebra::Vector2<f64>;

/// Physical constants of the standard two-world system (dimensionless units).
pub mod constants {
    /// Gravitational constant.
    pub const G: f64 = 9.8;
    /// Mass of the world the rocket departs from.
    pub const ORIGIN_WORLD_MASS: f64 = 0.4;
    /// Mass of the world the rocket is captured by.
    pub const DESTINATION_WORLD_MASS: f64 = 0.1;
    /// Fixed position of the origin world.
    pub const ORIGIN_WORLD_POSITION: [f64; 2] = [-2.5, -0.1];
    /// Fixed position of the destination world.
    pub const DESTINATION_WORLD_POSITION: [f64; 2] = [2.5, 0.1];
    /// Radius of the parking orbit around the destination world.
    pub const TARGET_ORBIT_RADIUS: f64 = 0.5;
    /// Upper bound on the accumulated fuel proxy over a transfer.
    pub const FUEL_BUDGET: f64 = 20.0;
    /// Scale `k` applied to `|u|^2` when integrating fuel use.
    pub const FUEL_COEFFICIENT: f64 = 1.0;
}

/// Accessors that split a [`State`] into its planar parts.
pub mod state {
    use super::{State, Vector2};

    /// Position part of a state.
    #[inline]
    pub fn position(state: &State) -> Vector2 {
        Vector2::new(state[0], state[1])
    }

    /// Velocity part of a state.
    #[inline]
    pub fn velocity(state: &State) -> Vector2 {
        Vector2::new(state[2], state[3])
    }

    /// Assemble a state from position and velocity.
    #[inline]
    pub fn from_parts(position: &Vector2, velocity: &Vector2) -> State {
        State::new(position.x, position.y, velocity.x, velocity.y)
    }

    /// True when every component is finite.
    #[inline]
    pub fn is_finite(state: &State) -> bool {
        state.iter().all(|v| v.is_finite())
    }
}

/// Minimal planar vector helpers.
pub mod vector {
    use super::Vector2;

    /// 2D cross product (z component of `a x b`).
    #[inline]
    pub fn cross(a: &Vector2, b: &Vector2) -> f64 {
        a.x * b.y - a.y * b.x
    }

    /// Rotate a vector by +90 degrees.
    #[inline]
    pub fn perp(v: &Vector2) -> Vector2 {
        Vector2::new(-v.y, v.x)
    }

    /// Evenly spaced samples over `[start, end]`, both ends included.
    pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
        match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (end - start) / (count - 1) as f64;
                let mut out: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
                // pin the last sample so callers can compare against `end` exactly
                out[count - 1] = end;
                out
            }
        }
    }
}
