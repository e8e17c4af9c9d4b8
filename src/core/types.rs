use serde::{Deserialize, Serialize};

/// 2D double-precision vector used for positions, velocities and fields.
pub use glam::DVec2 as Vector2;

/// Initial conditions for one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub id: String,
    pub mass: f64,
    pub position: Vector2,
    #[serde(default)]
    pub velocity: Vector2,
}

impl BodySpec {
    pub fn new(
        id: impl Into<String>,
        mass: f64,
        position: impl Into<Vector2>,
        velocity: impl Into<Vector2>,
    ) -> Self {
        Self {
            id: id.into(),
            mass,
            position: position.into(),
            velocity: velocity.into(),
        }
    }

    /// Body at rest at `position`.
    pub fn at_rest(id: impl Into<String>, mass: f64, position: impl Into<Vector2>) -> Self {
        Self::new(id, mass, position, Vector2::ZERO)
    }
}

/// Point-in-time read of one body, as handed to renderers and observers.
///
/// `velocity` is only present when the simulation publishes velocities
/// (diagnostics enabled).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodySnapshot {
    pub id: String,
    pub mass: f64,
    pub position: Vector2,
    pub velocity: Option<Vector2>,
}

impl BodySnapshot {
    /// Linear momentum, if the velocity was published.
    pub fn momentum(&self) -> Option<Vector2> {
        self.velocity.map(|v| v * self.mass)
    }
}
