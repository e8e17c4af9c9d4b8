//! Error types for the lockstep engine.
//!
//! Every fallible operation returns [`SimulationError`] through the [`Result`]
//! alias. Worker faults are recorded once per run and surfaced by
//! [`SimulationManager::stop`](crate::SimulationManager::stop) and
//! [`SimulationManager::join`](crate::SimulationManager::join).

use thiserror::Error;

/// Main error type for the simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Two bodies reached zero separation and the force law is undefined.
    #[error("numerical degeneracy: body `{body}` coincides with `{other}` at step {step}")]
    NumericalDegeneracy {
        body: String,
        other: String,
        step: u64,
    },
    /// Integration produced a NaN or infinite position/velocity.
    #[error("non-finite state for body `{body}` at step {step}")]
    NonFiniteState { body: String, step: u64 },
    /// The barrier broke and the recovery policy escalates breaks.
    #[error("barrier broken in generation {generation} (observed by `{body}`)")]
    BarrierBroken { body: String, generation: u64 },
    /// The supplied configuration cannot be simulated.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `start` was called on a simulation that already ran.
    #[error("simulation already started")]
    AlreadyStarted,
    /// The operation requires a started simulation.
    #[error("simulation not started")]
    NotStarted,
    /// A worker thread panicked.
    #[error("worker for body `{body}` panicked")]
    WorkerPanicked { body: String },
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker for body `{body}`: {reason}")]
    Spawn { body: String, reason: String },
}

impl SimulationError {
    /// Returns the body that raised the error, if the error is tied to one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::NumericalDegeneracy { body, .. }
            | Self::NonFiniteState { body, .. }
            | Self::BarrierBroken { body, .. }
            | Self::WorkerPanicked { body }
            | Self::Spawn { body, .. } => Some(body),
            Self::InvalidConfig(_) | Self::AlreadyStarted | Self::NotStarted => None,
        }
    }
}

/// Convenient Result type alias for simulation operations.
pub type Result<T> = std::result::Result<T, SimulationError>;
