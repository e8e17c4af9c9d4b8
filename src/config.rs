//! Configuration for a lockstep simulation run.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    core::types::BodySpec,
    dynamics::gravity::SeparationPolicy,
    error::{Result, SimulationError},
    sync::barrier::RecoveryPolicy,
};

/// Newtonian gravitational constant in SI units (m³ kg⁻¹ s⁻²).
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;

/// Default integration time step.
pub const DEFAULT_TIME_STEP: f64 = 0.01;

/// Minimum separation used by [`SeparationPolicy::Clamp`] when none is given.
pub const DEFAULT_MIN_SEPARATION: f64 = 1e-6;

/// Everything needed to construct a [`SimulationManager`](crate::SimulationManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Bodies in the order workers iterate over them.
    pub bodies: Vec<BodySpec>,
    pub dt: f64,
    pub gravitational_constant: f64,
    /// Publish velocities so snapshots carry them.
    pub diagnostics: bool,
    pub separation: SeparationPolicy,
    pub recovery: RecoveryPolicy,
    /// Break a round that does not complete in time. `None` waits forever.
    pub barrier_timeout: Option<Duration>,
    /// Stop every worker after this many steps. `None` runs until stopped.
    pub max_steps: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bodies: Vec::new(),
            dt: DEFAULT_TIME_STEP,
            gravitational_constant: GRAVITATIONAL_CONSTANT,
            diagnostics: false,
            separation: SeparationPolicy::Fatal,
            recovery: RecoveryPolicy::Escalate,
            barrier_timeout: None,
            max_steps: None,
        }
    }
}

impl SimulationConfig {
    pub fn new(bodies: Vec<BodySpec>, dt: f64) -> Self {
        Self {
            bodies,
            dt,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: BodySpec) -> Self {
        self.bodies.push(body);
        self
    }

    pub fn with_gravitational_constant(mut self, g: f64) -> Self {
        self.gravitational_constant = g;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn with_separation(mut self, separation: SeparationPolicy) -> Self {
        self.separation = separation;
        self
    }

    /// Clamp close encounters at [`DEFAULT_MIN_SEPARATION`].
    pub fn with_default_clamp(self) -> Self {
        self.with_separation(SeparationPolicy::Clamp {
            min_separation: DEFAULT_MIN_SEPARATION,
        })
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.barrier_timeout = Some(timeout);
        self
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Checks that the configuration describes a simulable system.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimulationError::InvalidConfig(msg));

        if self.bodies.is_empty() {
            return invalid("at least one body is required".into());
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return invalid(format!("time step must be positive and finite, got {}", self.dt));
        }
        if !self.gravitational_constant.is_finite() {
            return invalid("gravitational constant must be finite".into());
        }
        if let SeparationPolicy::Clamp { min_separation } = self.separation {
            if !(min_separation.is_finite() && min_separation > 0.0) {
                return invalid(format!(
                    "minimum separation must be positive and finite, got {min_separation}"
                ));
            }
        }
        if self.barrier_timeout == Some(Duration::ZERO) {
            return invalid("barrier timeout must be non-zero".into());
        }

        let mut seen = HashSet::with_capacity(self.bodies.len());
        for body in &self.bodies {
            if !seen.insert(body.id.as_str()) {
                return invalid(format!("duplicate body id `{}`", body.id));
            }
            if !(body.mass.is_finite() && body.mass > 0.0) {
                return invalid(format!(
                    "body `{}` must have positive finite mass, got {}",
                    body.id, body.mass
                ));
            }
            if !(body.position.is_finite() && body.velocity.is_finite()) {
                return invalid(format!("body `{}` has non-finite initial state", body.id));
            }
        }
        Ok(())
    }
}
