#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    config::SimulationConfig,
    core::types::{BodySnapshot, Vector2},
    error::{Result, SimulationError},
};

use super::{gravity::GravityKernel, integrator::SemiImplicitEuler};

#[derive(Debug, Clone)]
struct ReferenceBody {
    id: String,
    mass: f64,
    position: Vector2,
    velocity: Vector2,
}

/// Single-owner lockstep stepper.
///
/// Applies exactly the update the threaded workers apply, over a plain vector
/// of bodies: every body reads the previous step's positions, in body list
/// order, before any body is written. Its trajectories are bit-identical to
/// those of [`SimulationManager`](crate::SimulationManager), which makes it
/// the yardstick for the threaded engine.
#[derive(Debug, Clone)]
pub struct ReferenceStepper {
    bodies: Vec<ReferenceBody>,
    kernel: GravityKernel,
    integrator: SemiImplicitEuler,
    diagnostics: bool,
    steps: u64,
    parallel: bool,
}

impl ReferenceStepper {
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            bodies: config
                .bodies
                .iter()
                .map(|spec| ReferenceBody {
                    id: spec.id.clone(),
                    mass: spec.mass,
                    position: spec.position,
                    velocity: spec.velocity,
                })
                .collect(),
            kernel: GravityKernel::new(config.separation),
            integrator: SemiImplicitEuler::new(config.dt, config.gravitational_constant),
            diagnostics: config.diagnostics,
            steps: 0,
            parallel: false,
        })
    }

    /// Enables rayon for the compute pass. Has no effect on the results.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advances every body by one step.
    pub fn step(&mut self) -> Result<()> {
        let next = self.compute_all()?;
        for (body, (position, velocity)) in self.bodies.iter_mut().zip(next) {
            body.position = position;
            body.velocity = velocity;
        }
        self.steps += 1;
        Ok(())
    }

    pub fn run(&mut self, steps: u64) -> Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Same shape as [`SimulationManager::snapshot`](crate::SimulationManager::snapshot).
    pub fn snapshot(&self) -> Vec<BodySnapshot> {
        self.bodies
            .iter()
            .map(|body| BodySnapshot {
                id: body.id.clone(),
                mass: body.mass,
                position: body.position,
                velocity: self.diagnostics.then_some(body.velocity),
            })
            .collect()
    }

    fn compute_all(&self) -> Result<Vec<(Vector2, Vector2)>> {
        #[cfg(feature = "parallel")]
        if self.parallel {
            return (0..self.bodies.len())
                .into_par_iter()
                .map(|index| self.compute_one(index))
                .collect();
        }
        (0..self.bodies.len())
            .map(|index| self.compute_one(index))
            .collect()
    }

    fn compute_one(&self, index: usize) -> Result<(Vector2, Vector2)> {
        let body = &self.bodies[index];
        let others = self
            .bodies
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .map(|(_, other)| other);
        let sources = others.clone().map(|other| (other.mass, other.position));
        let field = self
            .kernel
            .field_at(body.position, sources)
            .map_err(|degeneracy| SimulationError::NumericalDegeneracy {
                body: body.id.clone(),
                other: others
                    .clone()
                    .nth(degeneracy.source)
                    .map(|other| other.id.clone())
                    .unwrap_or_default(),
                step: self.steps,
            })?;
        let (position, velocity) = self.integrator.advance(body.position, body.velocity, field);
        if !(position.is_finite() && velocity.is_finite()) {
            return Err(SimulationError::NonFiniteState {
                body: body.id.clone(),
                step: self.steps,
            });
        }
        Ok((position, velocity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BodySpec;

    #[test]
    fn free_body_moves_linearly() {
        let config =
            SimulationConfig::new(vec![BodySpec::new("solo", 1.0, [1.0, 1.0], [2.0, -4.0])], 0.25);
        let mut stepper = ReferenceStepper::new(&config).unwrap();
        stepper.run(8).unwrap();
        assert_eq!(stepper.snapshot()[0].position, Vector2::new(5.0, -7.0));
        assert_eq!(stepper.steps(), 8);
    }

    #[test]
    fn parallel_pass_matches_sequential() {
        let bodies = (0..6)
            .map(|i| {
                let angle = i as f64;
                BodySpec::new(
                    format!("b{i}"),
                    1.0 + i as f64,
                    [angle.cos() * 3.0, angle.sin() * 3.0],
                    [-angle.sin() * 0.2, angle.cos() * 0.2],
                )
            })
            .collect();
        let config = SimulationConfig::new(bodies, 0.01)
            .with_gravitational_constant(1.0)
            .with_diagnostics(true);

        let mut sequential = ReferenceStepper::new(&config).unwrap();
        let mut parallel = ReferenceStepper::new(&config).unwrap();
        parallel.set_parallel_enabled(true);
        sequential.run(200).unwrap();
        parallel.run(200).unwrap();
        assert_eq!(sequential.snapshot(), parallel.snapshot());
    }

    #[test]
    fn coincident_bodies_report_degeneracy() {
        let config = SimulationConfig::new(
            vec![
                BodySpec::at_rest("left", 1.0, [0.0, 0.0]),
                BodySpec::at_rest("right", 1.0, [0.0, 0.0]),
            ],
            0.1,
        );
        let mut stepper = ReferenceStepper::new(&config).unwrap();
        let err = stepper.step().unwrap_err();
        assert_eq!(
            err,
            SimulationError::NumericalDegeneracy {
                body: "left".into(),
                other: "right".into(),
                step: 0,
            }
        );
        assert!(stepper.snapshot().iter().all(|b| b.position.is_finite()));
    }

    #[test]
    fn overflow_is_reported_as_non_finite_state() {
        let config = SimulationConfig::new(
            vec![
                BodySpec::at_rest("heavy", 1e300, [0.0, 0.0]),
                BodySpec::at_rest("light", 1.0, [1.0, 0.0]),
            ],
            0.1,
        )
        .with_gravitational_constant(1e300);
        let mut stepper = ReferenceStepper::new(&config).unwrap();
        assert_eq!(
            stepper.step().unwrap_err(),
            SimulationError::NonFiniteState {
                body: "light".into(),
                step: 0,
            }
        );
        assert_eq!(stepper.steps(), 0);
    }
}
