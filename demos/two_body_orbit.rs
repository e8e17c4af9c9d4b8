use lockstep_nbody::*;

// Low-Earth orbit: a 1 kg satellite 6 400 km from Earth's center.
fn main() -> Result<()> {
    let period_estimate = 5_100.0;
    let dt = 0.5;
    let config = SimulationConfig::new(
        vec![
            BodySpec::at_rest("earth", 5.965e24, [0.0, 0.0]),
            BodySpec::new("satellite", 1.0, [6.4e6, 0.0], [0.0, 7_890.0]),
        ],
        dt,
    )
    .with_diagnostics(true)
    .with_max_steps((period_estimate / dt) as u64);

    let mut simulation = SimulationManager::new(config)?;
    simulation.set_observer(|round: u64, bodies: &[BodySnapshot]| {
        if round % 2_000 == 0 {
            let r = bodies[1].position - bodies[0].position;
            println!(
                "t = {:>6.0} s  orbital radius = {:.1} km",
                round as f64 * 0.5,
                r.length() / 1e3
            );
        }
    })?;
    simulation.start()?;
    let report = simulation.join()?;

    let bodies = simulation.snapshot();
    println!("rounds: {}", report.rounds);
    for body in &bodies {
        println!("{:>10}: position {:?} velocity {:?}", body.id, body.position, body.velocity);
    }
    Ok(())
}
