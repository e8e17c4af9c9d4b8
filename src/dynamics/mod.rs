//! Simulation dynamics: the gravity kernel, the integrator, the per-body
//! worker and a single-owner reference stepper.

pub mod gravity;
pub mod integrator;
pub mod reference;
pub mod worker;

pub use gravity::{Degeneracy, GravityKernel, SeparationPolicy};
pub use integrator::SemiImplicitEuler;
pub use reference::ReferenceStepper;
pub use worker::{IntegrationWorker, WorkerReport};
