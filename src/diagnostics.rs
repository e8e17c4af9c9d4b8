//! Advisory aggregates over snapshots and the per-round observer hook.
//!
//! Aggregates computed from [`SimulationManager::snapshot`](crate::SimulationManager::snapshot)
//! are not synchronized across bodies and may mix rounds. Aggregates computed
//! inside a [`RoundObserver`] see one exact round boundary.

use log::info;

use crate::core::types::{BodySnapshot, Vector2};

/// Called by the barrier leader once per completed round, with every body's
/// state at that round boundary (body list order). Runs on a worker thread
/// while the other workers compute the next step, so keep it short.
pub trait RoundObserver: Send + Sync {
    fn on_round(&self, round: u64, bodies: &[BodySnapshot]);
}

impl<F> RoundObserver for F
where
    F: Fn(u64, &[BodySnapshot]) + Send + Sync,
{
    fn on_round(&self, round: u64, bodies: &[BodySnapshot]) {
        self(round, bodies)
    }
}

/// Sum of `mass * velocity`. `None` if any velocity is unpublished.
pub fn total_momentum(bodies: &[BodySnapshot]) -> Option<Vector2> {
    bodies
        .iter()
        .try_fold(Vector2::ZERO, |acc, body| Some(acc + body.momentum()?))
}

/// Mass-weighted mean position. `None` for an empty or massless set.
pub fn center_of_mass(bodies: &[BodySnapshot]) -> Option<Vector2> {
    let total_mass: f64 = bodies.iter().map(|b| b.mass).sum();
    if total_mass <= 0.0 {
        return None;
    }
    let weighted = bodies
        .iter()
        .fold(Vector2::ZERO, |acc, b| acc + b.position * b.mass);
    Some(weighted / total_mass)
}

/// Total kinetic energy. `None` if any velocity is unpublished.
pub fn kinetic_energy(bodies: &[BodySnapshot]) -> Option<f64> {
    bodies.iter().try_fold(0.0, |acc, body| {
        let v = body.velocity?;
        Some(acc + 0.5 * body.mass * v.length_squared())
    })
}

/// Observer that logs momentum and center of mass every `interval` rounds.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsLogger {
    interval: u64,
}

impl DiagnosticsLogger {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
        }
    }
}

impl RoundObserver for DiagnosticsLogger {
    fn on_round(&self, round: u64, bodies: &[BodySnapshot]) {
        if round % self.interval != 0 {
            return;
        }
        for body in bodies {
            log::debug!("round {round} {}: position {}", body.id, body.position);
        }
        match total_momentum(bodies) {
            Some(momentum) => info!(
                "round {round}: total momentum {momentum}, center of mass {:?}",
                center_of_mass(bodies)
            ),
            None => info!(
                "round {round}: center of mass {:?} (velocities not published)",
                center_of_mass(bodies)
            ),
        }
    }
}
