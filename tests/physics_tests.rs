use approx::assert_relative_eq;
use lockstep_nbody::*;
use parking_lot::Mutex;
use std::f64::consts::TAU;
use std::sync::Arc;

fn run_to_completion(config: SimulationConfig) -> (SimulationReport, Vec<BodySnapshot>) {
    let mut simulation = SimulationManager::new(config).expect("valid config");
    simulation.start().expect("workers start");
    let report = simulation.join().expect("run completes");
    (report, simulation.snapshot())
}

/// Nine-body cluster: two heavy bodies and seven lighter ones around them.
fn cluster() -> Vec<BodySpec> {
    vec![
        BodySpec::new("body1", 1e11, [0.0, 100.0], [0.1, 0.0]),
        BodySpec::new("body2", 1e11, [0.0, -100.0], [-0.1, 0.0]),
        BodySpec::new("body3", 1e10, [100.0, 0.0], [0.0, -0.3]),
        BodySpec::new("body4", 1e10, [-100.0, 0.0], [0.0, 0.3]),
        BodySpec::new("body5", 1e10, [0.0, 0.0], [0.0, 0.0]),
        BodySpec::new("body6", 1e10, [0.0, 50.0], [0.15, 0.0]),
        BodySpec::new("body7", 1e10, [0.0, -50.0], [-0.15, 0.0]),
        BodySpec::new("body8", 1e10, [50.0, 0.0], [0.0, -0.15]),
        BodySpec::new("body9", 1e10, [-50.0, 0.0], [0.0, 0.15]),
    ]
}

fn orbit_error_after_one_period(dt: f64) -> f64 {
    let steps = (TAU / dt).round() as u64;
    let config = SimulationConfig::new(
        vec![
            BodySpec::at_rest("star", 1.0, [0.0, 0.0]),
            BodySpec::new("planet", 1e-12, [1.0, 0.0], [0.0, 1.0]),
        ],
        dt,
    )
    .with_gravitational_constant(1.0)
    .with_max_steps(steps);

    let (_, bodies) = run_to_completion(config);
    let t = steps as f64 * dt;
    let relative = bodies[1].position - bodies[0].position;
    (relative - Vector2::new(t.cos(), t.sin())).length()
}

#[test]
fn single_body_moves_freely() {
    let solo = BodySpec::new("solo", 5.0, [1.0, 1.0], [2.0, -4.0]);
    let config = SimulationConfig::new(vec![solo], 0.25)
        .with_diagnostics(true)
        .with_max_steps(8);
    let (report, bodies) = run_to_completion(config);

    assert_eq!(report.rounds, 8);
    assert_eq!(bodies[0].position, Vector2::new(5.0, -7.0));
    assert_eq!(bodies[0].velocity, Some(Vector2::new(2.0, -4.0)));
}

#[test]
fn circular_orbit_converges_with_dt() {
    let coarse = orbit_error_after_one_period(2e-3);
    let fine = orbit_error_after_one_period(1e-3);

    assert!(coarse < 1e-3, "coarse error too large: {coarse}");
    assert!(fine > 0.0);
    // At least first-order convergence.
    assert!(fine <= coarse * 0.55, "coarse {coarse}, fine {fine}");
}

#[test]
fn center_of_mass_stays_put_for_ten_thousand_steps() {
    const STEPS: u64 = 10_000;
    let config = SimulationConfig::new(
        vec![
            BodySpec::new("east", 1.0, [1.0, 0.0], [0.0, 0.5]),
            BodySpec::new("west", 1.0, [-1.0, 0.0], [0.0, -0.5]),
        ],
        1e-3,
    )
    .with_gravitational_constant(1.0)
    .with_diagnostics(true)
    .with_max_steps(STEPS);

    let samples = Arc::new(Mutex::new(Vec::with_capacity(STEPS as usize)));
    let mut simulation = SimulationManager::new(config).unwrap();
    {
        let samples = Arc::clone(&samples);
        simulation
            .set_observer(move |round: u64, bodies: &[BodySnapshot]| {
                let com = center_of_mass(bodies).unwrap();
                let momentum = total_momentum(bodies).unwrap();
                samples.lock().push((round, com, momentum));
            })
            .unwrap();
    }
    simulation.start().unwrap();
    let report = simulation.join().unwrap();
    assert_eq!(report.rounds, STEPS);

    let samples = samples.lock();
    assert_eq!(samples.len(), STEPS as usize);
    for (index, (round, com, momentum)) in samples.iter().enumerate() {
        assert_eq!(*round, index as u64 + 1);
        assert!(com.length() < 1e-12, "round {round}: center of mass {com}");
        assert!(momentum.length() < 1e-12, "round {round}: momentum {momentum}");
    }
}

#[test]
fn identical_runs_are_bit_identical() {
    let config = SimulationConfig::new(cluster(), 0.01)
        .with_diagnostics(true)
        .with_max_steps(300);

    let (first_report, first) = run_to_completion(config.clone());
    let (_, second) = run_to_completion(config.clone());

    let mut reference = ReferenceStepper::new(&config).unwrap();
    reference.run(300).unwrap();
    let expected = reference.snapshot();

    assert_eq!(first_report.rounds, 300);
    for ((a, b), r) in first.iter().zip(&second).zip(&expected) {
        assert_eq!(a.id, r.id);
        assert_eq!(a.position.x.to_bits(), b.position.x.to_bits());
        assert_eq!(a.position.y.to_bits(), b.position.y.to_bits());
        assert_eq!(a.position.x.to_bits(), r.position.x.to_bits());
        assert_eq!(a.position.y.to_bits(), r.position.y.to_bits());
        assert_eq!(a.velocity, r.velocity);
    }
}

#[test]
fn coincident_bodies_are_a_fatal_degeneracy() {
    let config = SimulationConfig::new(
        vec![
            BodySpec::at_rest("a", 1.0, [3.0, 3.0]),
            BodySpec::at_rest("b", 2.0, [3.0, 3.0]),
            BodySpec::at_rest("c", 1.0, [10.0, 3.0]),
        ],
        0.01,
    )
    .with_diagnostics(true)
    .with_max_steps(100);

    let mut simulation = SimulationManager::new(config).unwrap();
    simulation.start().unwrap();
    let err = simulation.join().unwrap_err();

    match &err {
        SimulationError::NumericalDegeneracy { body, other, step } => {
            assert_eq!(*step, 0);
            let mut pair = [body.as_str(), other.as_str()];
            pair.sort();
            assert_eq!(pair, ["a", "b"]);
        }
        other => panic!("expected a degeneracy, got {other:?}"),
    }
    assert_eq!(simulation.fault(), Some(err));
    for body in simulation.snapshot() {
        assert!(body.position.is_finite());
        assert!(body.velocity.unwrap().is_finite());
    }
    assert!(!simulation.barrier().is_broken());
}

#[test]
fn clamped_separation_keeps_state_finite() {
    let config = SimulationConfig::new(
        vec![
            BodySpec::at_rest("a", 1.0, [0.0, 0.0]),
            BodySpec::at_rest("b", 1.0, [0.0, 0.0]),
            BodySpec::at_rest("c", 1.0, [1e-3, 0.0]),
        ],
        0.01,
    )
    .with_gravitational_constant(1.0)
    .with_separation(SeparationPolicy::Clamp { min_separation: 0.05 })
    .with_diagnostics(true)
    .with_max_steps(200);

    let (report, bodies) = run_to_completion(config);
    assert_eq!(report.rounds, 200);
    for body in bodies {
        assert!(body.position.is_finite(), "{} went non-finite", body.id);
    }
}

#[test]
fn momentum_is_conserved_in_the_cluster() {
    let config = SimulationConfig::new(cluster(), 0.01)
        .with_diagnostics(true)
        .with_max_steps(500);
    let (initial, scale) = {
        let simulation = SimulationManager::new(config.clone()).unwrap();
        let bodies = simulation.snapshot();
        let scale: f64 = bodies.iter().map(|b| b.momentum().unwrap().length()).sum();
        (total_momentum(&bodies).unwrap(), scale)
    };

    let (_, bodies) = run_to_completion(config);
    let after = total_momentum(&bodies).unwrap();
    assert_relative_eq!(after.x, initial.x, epsilon = 1e-9 * scale);
    assert_relative_eq!(after.y, initial.y, epsilon = 1e-9 * scale);
}
