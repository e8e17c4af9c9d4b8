//! Per-body integration worker and the run context it shares with its peers.
//!
//! Each worker repeats a fixed protocol once per step:
//!
//! 1. READ: own state from locals, every other body's current position.
//! 2. COMPUTE: the gravitational field at the own position.
//! 3. INTEGRATE: one semi-implicit Euler step.
//! 4. SYNC#1: nobody writes until everybody has read.
//! 5. WRITE: publish the new state into the own [`BodyState`].
//! 6. SYNC#2: nobody reads the next step until everybody has written.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::{
    core::{body::BodyState, types::BodySnapshot},
    diagnostics::RoundObserver,
    error::{Result, SimulationError},
    sync::{BarrierError, RecoveryPolicy, RendezvousBarrier, StopToken},
    utils::profiling::{ScopedTimer, WorkerProfile},
};

use super::{gravity::GravityKernel, integrator::SemiImplicitEuler};

/// State shared by every worker of one run.
pub(crate) struct RunContext {
    pub(crate) barrier: Arc<RendezvousBarrier>,
    pub(crate) stop: StopToken,
    pub(crate) bodies: Vec<Arc<BodyState>>,
    pub(crate) observer: Option<Arc<dyn RoundObserver>>,
    pub(crate) recovery: RecoveryPolicy,
    pub(crate) barrier_timeout: Option<Duration>,
    fault: Mutex<Option<SimulationError>>,
    completed_rounds: AtomicU64,
    recoveries: AtomicU64,
}

impl RunContext {
    pub(crate) fn new(
        barrier: Arc<RendezvousBarrier>,
        stop: StopToken,
        bodies: Vec<Arc<BodyState>>,
        observer: Option<Arc<dyn RoundObserver>>,
        recovery: RecoveryPolicy,
        barrier_timeout: Option<Duration>,
    ) -> Self {
        Self {
            barrier,
            stop,
            bodies,
            observer,
            recovery,
            barrier_timeout,
            fault: Mutex::new(None),
            completed_rounds: AtomicU64::new(0),
            recoveries: AtomicU64::new(0),
        }
    }

    /// Records the first fatal error of the run and stops every worker.
    pub(crate) fn fail(&self, err: SimulationError) {
        {
            let mut fault = self.fault.lock();
            if fault.is_none() {
                error!("simulation fault: {err}");
                *fault = Some(err);
            }
        }
        self.shutdown();
    }

    /// Requests termination and wakes any worker parked at the barrier.
    pub(crate) fn shutdown(&self) {
        self.stop.stop();
        self.barrier.cancel();
    }

    pub(crate) fn fault(&self) -> Option<SimulationError> {
        self.fault.lock().clone()
    }

    pub(crate) fn completed_rounds(&self) -> u64 {
        self.completed_rounds.load(Ordering::Acquire)
    }

    pub(crate) fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Acquire)
    }

    fn finish_round(&self) {
        let round = self.completed_rounds.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(observer) = &self.observer {
            let snapshot: Vec<BodySnapshot> = self.bodies.iter().map(|b| b.snapshot()).collect();
            observer.on_round(round, &snapshot);
        }
    }
}

/// Outcome of one worker's run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub id: String,
    pub steps: u64,
    pub profile: WorkerProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    Proceed,
    Stopped,
}

/// Advances one body. Holds the only write access to its [`BodyState`].
pub struct IntegrationWorker {
    body: Arc<BodyState>,
    others: Vec<Arc<BodyState>>,
    kernel: GravityKernel,
    integrator: SemiImplicitEuler,
    max_steps: Option<u64>,
    context: Arc<RunContext>,
}

impl IntegrationWorker {
    pub(crate) fn new(
        index: usize,
        kernel: GravityKernel,
        integrator: SemiImplicitEuler,
        max_steps: Option<u64>,
        context: Arc<RunContext>,
    ) -> Self {
        let body = Arc::clone(&context.bodies[index]);
        let others = context
            .bodies
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .map(|(_, other)| Arc::clone(other))
            .collect();
        Self {
            body,
            others,
            kernel,
            integrator,
            max_steps,
            context,
        }
    }

    pub fn id(&self) -> &str {
        self.body.id()
    }

    /// Runs until stopped, `max_steps` is reached or a fatal error occurs.
    pub fn run(self) -> Result<WorkerReport> {
        let started = Instant::now();
        let mut profile = WorkerProfile::default();
        // Velocity is only published with diagnostics, so locals are authoritative.
        let (mut position, mut velocity) = self.body.read();
        let mut step = 0u64;

        while self.max_steps.map_or(true, |max| step < max) {
            let (next_position, next_velocity) = {
                let _timer = ScopedTimer::new(&mut profile.compute_time);
                let sources = self.others.iter().map(|other| (other.mass(), other.position()));
                let field = self.kernel.field_at(position, sources).map_err(|degeneracy| {
                    SimulationError::NumericalDegeneracy {
                        body: self.id().to_owned(),
                        other: self.others[degeneracy.source].id().to_owned(),
                        step,
                    }
                })?;
                self.integrator.advance(position, velocity, field)
            };
            if !(next_position.is_finite() && next_velocity.is_finite()) {
                return Err(SimulationError::NonFiniteState {
                    body: self.id().to_owned(),
                    step,
                });
            }

            if self.advance_round(Phase::Read, &mut profile)? == Round::Stopped {
                break;
            }

            {
                let _timer = ScopedTimer::new(&mut profile.write_time);
                self.body.write(next_position, next_velocity);
            }
            position = next_position;
            velocity = next_velocity;
            step += 1;

            if self.advance_round(Phase::Write, &mut profile)? == Round::Stopped {
                break;
            }
        }

        profile.steps = step;
        profile.total_time = started.elapsed();
        profile.report(self.id());
        debug!("worker {} exiting after {step} steps", self.id());
        Ok(WorkerReport {
            id: self.id().to_owned(),
            steps: step,
            profile,
        })
    }

    /// Checks the stop token, then waits at the barrier. The leader of the
    /// write phase closes the round.
    fn advance_round(&self, phase: Phase, profile: &mut WorkerProfile) -> Result<Round> {
        if self.context.stop.is_stopped() {
            return Ok(Round::Stopped);
        }

        let barrier = &self.context.barrier;
        let waited = {
            let _timer = ScopedTimer::new(&mut profile.wait_time);
            match self.context.barrier_timeout {
                Some(timeout) => barrier.wait_timeout(timeout),
                None => barrier.wait(),
            }
        };

        match waited {
            Ok(result) => {
                if phase == Phase::Write && result.is_leader() {
                    self.context.finish_round();
                }
                Ok(Round::Proceed)
            }
            Err(BarrierError::Cancelled) => Ok(Round::Stopped),
            Err(BarrierError::Broken { generation }) => match self.context.recovery {
                RecoveryPolicy::Escalate => Err(SimulationError::BarrierBroken {
                    body: self.id().to_owned(),
                    generation,
                }),
                RecoveryPolicy::Reset => {
                    if barrier.recover(generation) {
                        self.context.recoveries.fetch_add(1, Ordering::AcqRel);
                        warn!(
                            "body {} reset barrier broken in generation {generation} ({phase:?})",
                            self.id()
                        );
                    }
                    Ok(Round::Proceed)
                }
            },
            Err(BarrierError::NoParties) => Err(SimulationError::InvalidConfig(
                "barrier has no parties".into(),
            )),
        }
    }
}

/// Routes a panicking worker's exit into the run's fault slot.
pub(crate) struct PanicGuard {
    body: String,
    context: Arc<RunContext>,
}

impl PanicGuard {
    pub(crate) fn new(body: &str, context: Arc<RunContext>) -> Self {
        Self {
            body: body.to_owned(),
            context,
        }
    }
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.context.fail(SimulationError::WorkerPanicked {
                body: std::mem::take(&mut self.body),
            });
        }
    }
}
