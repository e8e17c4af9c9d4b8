use std::thread;
use std::time::Duration;

use lockstep_nbody::*;

// Nine bodies polled the way a renderer would: asynchronously, while the
// workers keep stepping.
fn main() -> Result<()> {
    let config = SimulationConfig::new(
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
        ],
        0.01,
    )
    .with_diagnostics(true)
    .with_default_clamp();

    let mut simulation = SimulationManager::new(config)?;
    simulation.start()?;

    for _ in 0..10 {
        thread::sleep(Duration::from_millis(100));
        let snapshot = simulation.snapshot();
        // Advisory only: bodies may come from different rounds.
        println!(
            "round ~{:>7}  momentum {:?}  center of mass {:?}",
            simulation.completed_rounds(),
            total_momentum(&snapshot),
            center_of_mass(&snapshot)
        );
    }

    let report = simulation.stop()?;
    for worker in &report.workers {
        println!(
            "{}: {} steps, {:.0}% waiting at the barrier",
            worker.id,
            worker.steps,
            worker.profile.wait_fraction() * 100.0
        );
    }
    Ok(())
}
