use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::{
    config::SimulationConfig,
    core::{body::BodyState, types::BodySnapshot},
    diagnostics::RoundObserver,
    dynamics::{
        gravity::GravityKernel,
        integrator::SemiImplicitEuler,
        worker::{IntegrationWorker, PanicGuard, RunContext, WorkerReport},
    },
    error::{Result, SimulationError},
    sync::{RendezvousBarrier, StopToken},
    utils::logging::{warn_if_shutdown_slow, TraceSpan},
};

const SHUTDOWN_BUDGET: Duration = Duration::from_millis(250);

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    /// Rounds closed by an unbroken write barrier. Without breaks every
    /// worker took this many steps, or one more if stopped before the close.
    pub rounds: u64,
    /// Torn rounds: barrier breaks recovered under
    /// [`RecoveryPolicy::Reset`](crate::RecoveryPolicy::Reset). Each one let
    /// some workers advance without their peers, so `rounds` and the worker
    /// step counts drift apart.
    pub recoveries: u64,
    /// One entry per worker, in body list order.
    pub workers: Vec<WorkerReport>,
}

struct WorkerHandle {
    id: String,
    handle: JoinHandle<Result<WorkerReport>>,
}

/// Owns the bodies, the barrier and one integration worker thread per body.
pub struct SimulationManager {
    config: SimulationConfig,
    bodies: Vec<Arc<BodyState>>,
    barrier: Arc<RendezvousBarrier>,
    stop: StopToken,
    observer: Option<Arc<dyn RoundObserver>>,
    context: Option<Arc<RunContext>>,
    workers: Vec<WorkerHandle>,
    outcome: Option<Result<SimulationReport>>,
}

impl SimulationManager {
    /// Validates `config` and builds the shared state. No thread starts yet.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let bodies = config
            .bodies
            .iter()
            .map(|spec| Arc::new(BodyState::new(spec, config.diagnostics)))
            .collect::<Vec<_>>();
        let barrier = RendezvousBarrier::new(bodies.len())
            .map_err(|err| SimulationError::InvalidConfig(err.to_string()))?;

        Ok(Self {
            config,
            bodies,
            barrier: Arc::new(barrier),
            stop: StopToken::new(),
            observer: None,
            context: None,
            workers: Vec::new(),
            outcome: None,
        })
    }

    /// Installs the observer called at every completed round. Must precede
    /// [`start`](Self::start).
    pub fn set_observer<O>(&mut self, observer: O) -> Result<()>
    where
        O: RoundObserver + 'static,
    {
        if self.context.is_some() {
            return Err(SimulationError::AlreadyStarted);
        }
        self.observer = Some(Arc::new(observer));
        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn bodies(&self) -> &[Arc<BodyState>] {
        &self.bodies
    }

    pub fn barrier(&self) -> &RendezvousBarrier {
        &self.barrier
    }

    /// Spawns one named worker thread per body.
    pub fn start(&mut self) -> Result<()> {
        if self.context.is_some() {
            return Err(SimulationError::AlreadyStarted);
        }
        let _span = TraceSpan::new("simulation::start");

        let context = Arc::new(RunContext::new(
            Arc::clone(&self.barrier),
            self.stop.clone(),
            self.bodies.clone(),
            self.observer.clone(),
            self.config.recovery,
            self.config.barrier_timeout,
        ));
        self.context = Some(Arc::clone(&context));

        let kernel = GravityKernel::new(self.config.separation);
        let integrator = SemiImplicitEuler::new(self.config.dt, self.config.gravitational_constant);

        for index in 0..self.bodies.len() {
            let worker = IntegrationWorker::new(
                index,
                kernel,
                integrator,
                self.config.max_steps,
                Arc::clone(&context),
            );
            let id = worker.id().to_owned();
            let worker_context = Arc::clone(&context);
            let spawned = thread::Builder::new()
                .name(format!("body-{id}"))
                .spawn(move || {
                    let guard = PanicGuard::new(worker.id(), Arc::clone(&worker_context));
                    let result = worker.run();
                    if let Err(err) = &result {
                        worker_context.fail(err.clone());
                    }
                    drop(guard);
                    result
                });

            match spawned {
                Ok(handle) => self.workers.push(WorkerHandle { id, handle }),
                Err(err) => {
                    let err = SimulationError::Spawn {
                        body: id,
                        reason: err.to_string(),
                    };
                    // Workers already running wait for a party that never arrives.
                    context.fail(err.clone());
                    let _ = self.finish(false);
                    return Err(err);
                }
            }
        }

        info!(
            "started {} workers (dt = {}, diagnostics = {}, max steps = {:?})",
            self.workers.len(),
            self.config.dt,
            self.config.diagnostics,
            self.config.max_steps
        );
        Ok(())
    }

    /// Current state of every body, in body list order. Never blocks; bodies
    /// may be captured in different rounds.
    pub fn snapshot(&self) -> Vec<BodySnapshot> {
        self.bodies.iter().map(|body| body.snapshot()).collect()
    }

    /// Whether workers are still stepping.
    pub fn is_running(&self) -> bool {
        self.context.is_some()
            && self.outcome.is_none()
            && !self.stop.is_stopped()
            && self.workers.iter().any(|w| !w.handle.is_finished())
    }

    /// First fatal error recorded by any worker so far.
    pub fn fault(&self) -> Option<SimulationError> {
        self.context.as_ref().and_then(|context| context.fault())
    }

    /// Rounds completed so far.
    pub fn completed_rounds(&self) -> u64 {
        self.context
            .as_ref()
            .map_or(0, |context| context.completed_rounds())
    }

    /// Stops every worker, waits for them and leaves the barrier reset.
    ///
    /// Returns the run report, or the first fatal error a worker hit.
    /// Calling it again returns the same outcome.
    pub fn stop(&mut self) -> Result<SimulationReport> {
        self.finish(true)
    }

    /// Waits for the run to end on its own: a bounded run (`max_steps`)
    /// completing, or any run hitting a fatal error.
    pub fn join(&mut self) -> Result<SimulationReport> {
        let ends_on_its_own = self.config.max_steps.is_some()
            || self.outcome.is_some()
            || self.fault().is_some()
            || self.workers.iter().all(|w| w.handle.is_finished());
        if !ends_on_its_own {
            return Err(SimulationError::InvalidConfig(
                "join on a healthy unbounded run never returns; use stop()".into(),
            ));
        }
        self.finish(false)
    }

    fn finish(&mut self, cancel: bool) -> Result<SimulationReport> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let context = match &self.context {
            Some(context) => Arc::clone(context),
            None => return Err(SimulationError::NotStarted),
        };
        let _span = TraceSpan::new("simulation::finish");
        let started = Instant::now();

        if cancel {
            context.shutdown();
        }

        let mut workers = Vec::with_capacity(self.workers.len());
        let mut first_error = None;
        for WorkerHandle { id, handle } in self.workers.drain(..) {
            match handle.join() {
                Ok(Ok(report)) => workers.push(report),
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(_) => {
                    first_error.get_or_insert(SimulationError::WorkerPanicked { body: id });
                }
            }
        }
        self.stop.stop();
        self.barrier.reset();
        if cancel {
            warn_if_shutdown_slow(started.elapsed(), SHUTDOWN_BUDGET);
        }

        let outcome = match context.fault().or(first_error) {
            Some(err) => Err(err),
            None => Ok(SimulationReport {
                rounds: context.completed_rounds(),
                recoveries: context.recoveries(),
                workers,
            }),
        };
        match &outcome {
            Ok(report) => info!(
                "simulation finished after {} rounds ({} barrier recoveries)",
                report.rounds, report.recoveries
            ),
            Err(err) => debug!("simulation finished with error: {err}"),
        }
        self.outcome = Some(outcome.clone());
        outcome
    }
}

impl Drop for SimulationManager {
    fn drop(&mut self) {
        if self.context.is_some() && self.outcome.is_none() {
            let _ = self.finish(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BodySpec;

    fn pair() -> SimulationConfig {
        SimulationConfig::new(
            vec![
                BodySpec::at_rest("a", 1.0, [-1.0, 0.0]),
                BodySpec::at_rest("b", 1.0, [1.0, 0.0]),
            ],
            0.01,
        )
        .with_gravitational_constant(1.0)
    }

    #[test]
    fn lifecycle_errors() {
        let mut manager = SimulationManager::new(pair()).unwrap();
        assert_eq!(manager.stop(), Err(SimulationError::NotStarted));
        manager.start().unwrap();
        assert_eq!(manager.start(), Err(SimulationError::AlreadyStarted));
        assert_eq!(
            manager.set_observer(|_: u64, _: &[BodySnapshot]| {}),
            Err(SimulationError::AlreadyStarted)
        );
        let report = manager.stop().unwrap();
        assert_eq!(report.workers.len(), 2);
        assert_eq!(manager.stop().unwrap(), report);
        assert!(!manager.is_running());
        assert!(!manager.barrier().is_broken());
    }

    #[test]
    fn join_requires_bounded_run() {
        let mut manager = SimulationManager::new(pair()).unwrap();
        manager.start().unwrap();
        assert!(matches!(manager.join(), Err(SimulationError::InvalidConfig(_))));
        manager.stop().unwrap();
    }

    #[test]
    fn join_returns_fault_of_unbounded_run() {
        let config = SimulationConfig::new(
            vec![
                BodySpec::at_rest("a", 1.0, [0.0, 0.0]),
                BodySpec::at_rest("b", 1.0, [0.0, 0.0]),
            ],
            0.01,
        );
        let mut manager = SimulationManager::new(config).unwrap();
        manager.start().unwrap();
        while manager.fault().is_none() {
            std::thread::yield_now();
        }

        let err = manager.join().unwrap_err();
        assert!(
            matches!(err, SimulationError::NumericalDegeneracy { step: 0, .. }),
            "unexpected error {err:?}"
        );
        assert_eq!(manager.stop(), Err(err));
    }

    #[test]
    fn bounded_run_completes_every_round() {
        let mut manager = SimulationManager::new(pair().with_max_steps(50)).unwrap();
        manager.start().unwrap();
        let report = manager.join().unwrap();
        assert_eq!(report.rounds, 50);
        assert!(report.workers.iter().all(|w| w.steps == 50));
        assert_eq!(manager.completed_rounds(), 50);
    }
}
