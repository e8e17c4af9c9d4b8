//! Lockstep N-body gravity.
//!
//! Each body is advanced by its own integration worker thread. Workers meet
//! twice per step at a shared [`RendezvousBarrier`]: once after every worker
//! has read the system and computed its update, and once after every worker
//! has published it. The barrier is the only synchronization; body state
//! cells carry no locks.
//!
//! ```no_run
//! use lockstep_nbody::{BodySpec, SimulationConfig, SimulationManager};
//!
//! let config = SimulationConfig::new(
//!     vec![
//!         BodySpec::at_rest("sun", 1.0, [0.0, 0.0]),
//!         BodySpec::new("planet", 1e-6, [1.0, 0.0], [0.0, 1.0]),
//!     ],
//!     1e-3,
//! )
//! .with_gravitational_constant(1.0)
//! .with_max_steps(1_000);
//!
//! let mut simulation = SimulationManager::new(config)?;
//! simulation.start()?;
//! let report = simulation.join()?;
//! println!("{} rounds, final state {:?}", report.rounds, simulation.snapshot());
//! # Ok::<(), lockstep_nbody::SimulationError>(())
//! ```

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod dynamics;
pub mod error;
pub mod simulation;
pub mod sync;
pub mod utils;

pub use config::{SimulationConfig, DEFAULT_TIME_STEP, GRAVITATIONAL_CONSTANT};
pub use crate::core::{BodySnapshot, BodySpec, BodyState, Vector2};
pub use diagnostics::{
    center_of_mass, kinetic_energy, total_momentum, DiagnosticsLogger, RoundObserver,
};
pub use dynamics::{
    GravityKernel, IntegrationWorker, ReferenceStepper, SemiImplicitEuler, SeparationPolicy,
    WorkerReport,
};
pub use error::{Result, SimulationError};
pub use simulation::{SimulationManager, SimulationReport};
pub use sync::{BarrierError, BarrierWaitResult, RecoveryPolicy, RendezvousBarrier, StopToken};
pub use utils::WorkerProfile;
