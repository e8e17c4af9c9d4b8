use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{BodySnapshot, BodySpec, Vector2};

/// Lock-free 2D cell. Each component is stored as raw `f64` bits.
///
/// Loads and stores are relaxed: ordering between the owning writer and the
/// other workers comes from the barrier, not from this cell. The two
/// components are independent, so an unsynchronized reader may observe `x`
/// and `y` from different rounds.
#[derive(Debug)]
struct SharedVec2 {
    x: AtomicU64,
    y: AtomicU64,
}

impl SharedVec2 {
    fn new(value: Vector2) -> Self {
        Self {
            x: AtomicU64::new(value.x.to_bits()),
            y: AtomicU64::new(value.y.to_bits()),
        }
    }

    fn load(&self) -> Vector2 {
        Vector2::new(
            f64::from_bits(self.x.load(Ordering::Relaxed)),
            f64::from_bits(self.y.load(Ordering::Relaxed)),
        )
    }

    fn store(&self, value: Vector2) {
        self.x.store(value.x.to_bits(), Ordering::Relaxed);
        self.y.store(value.y.to_bits(), Ordering::Relaxed);
    }
}

/// Shared position/velocity record for one body.
///
/// Exactly one integration worker writes a given `BodyState`; every other
/// worker and the renderer only read it. Mass and id are fixed at
/// construction. Values are mutually consistent only at barrier boundaries.
#[derive(Debug)]
pub struct BodyState {
    id: String,
    mass: f64,
    position: SharedVec2,
    velocity: SharedVec2,
    publish_velocity: bool,
}

impl BodyState {
    /// Creates the state from initial conditions. `publish_velocity` decides
    /// whether [`write`](Self::write) updates the shared velocity.
    pub fn new(spec: &BodySpec, publish_velocity: bool) -> Self {
        Self {
            id: spec.id.clone(),
            mass: spec.mass,
            position: SharedVec2::new(spec.position),
            velocity: SharedVec2::new(spec.velocity),
            publish_velocity,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Whether velocity writes are published to readers.
    pub fn publishes_velocity(&self) -> bool {
        self.publish_velocity
    }

    pub fn position(&self) -> Vector2 {
        self.position.load()
    }

    /// Reads `(position, velocity)`. Callable from any thread at any time.
    ///
    /// When velocities are not published the returned velocity is the
    /// initial one.
    pub fn read(&self) -> (Vector2, Vector2) {
        (self.position.load(), self.velocity.load())
    }

    /// Publishes a new state. Only the owning worker may call this, once per
    /// round, between the two barrier phases.
    pub(crate) fn write(&self, position: Vector2, velocity: Vector2) {
        self.position.store(position);
        if self.publish_velocity {
            self.velocity.store(velocity);
        }
    }

    pub fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            id: self.id.clone(),
            mass: self.mass,
            position: self.position.load(),
            velocity: self.publish_velocity.then(|| self.velocity.load()),
        }
    }
}
