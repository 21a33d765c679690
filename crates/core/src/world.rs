use crate::Vector2;
use crate::constants::{
    DESTINATION_WORLD_MASS, DESTINATION_WORLD_POSITION, G, ORIGIN_WORLD_MASS,
    ORIGIN_WORLD_POSITION,
};

/// A fixed point mass.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub name: String,
    pub position: Vector2,
    /// Gravitational parameter (G times mass).
    pub mu: f64,
}

impl Body {
    pub fn new(name: impl Into<String>, position: Vector2, mu: f64) -> Self {
        Self {
            name: name.into(),
            position,
            mu,
        }
    }

    /// Build a body from its mass and the gravitational constant.
    pub fn from_mass(name: impl Into<String>, position: Vector2, mass: f64, g: f64) -> Self {
        Self::new(name, position, g * mass)
    }

    /// Distance from `point` to the body centre.
    #[inline]
    pub fn distance_to(&self, point: &Vector2) -> f64 {
        (point - self.position).norm()
    }
}

/// The two fixed bodies the rocket moves between.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    /// Body the rocket starts near.
    pub origin: Body,
    /// Body whose orbit the rocket must be captured into.
    pub destination: Body,
}

impl World {
    pub fn new(origin: Body, destination: Body) -> Self {
        Self {
            origin,
            destination,
        }
    }

    /// The reference two-world system.
    pub fn standard() -> Self {
        let [ox, oy] = ORIGIN_WORLD_POSITION;
        let [dx, dy] = DESTINATION_WORLD_POSITION;
        Self {
            origin: Body::from_mass("world_1", Vector2::new(ox, oy), ORIGIN_WORLD_MASS, G),
            destination: Body::from_mass(
                "world_2",
                Vector2::new(dx, dy),
                DESTINATION_WORLD_MASS,
                G,
            ),
        }
    }

    /// Both bodies, origin first.
    pub fn bodies(&self) -> [&Body; 2] {
        [&self.origin, &self.destination]
    }
}

impl Default for World {
    fn default() -> Self {
        Self::standard()
    }
}
