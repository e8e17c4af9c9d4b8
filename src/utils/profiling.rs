use std::time::{Duration, Instant};

use log::{debug, log_enabled, Level};

/// Per-worker phase timings accumulated over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct WorkerProfile {
    pub compute_time: Duration,
    pub wait_time: Duration,
    pub write_time: Duration,
    pub total_time: Duration,
    pub steps: u64,
}

impl WorkerProfile {
    /// Share of the run spent blocked at the barrier, in `[0, 1]`.
    pub fn wait_fraction(&self) -> f64 {
        let total = self.total_time.as_secs_f64();
        if total <= 0.0 {
            return 0.0;
        }
        (self.wait_time.as_secs_f64() / total).min(1.0)
    }

    pub fn report(&self, body: &str) {
        if !log_enabled!(Level::Debug) {
            return;
        }
        let total_us = self.total_time.as_micros() as f64;
        if total_us < 1.0 {
            return;
        }
        let share = |d: Duration| d.as_micros() as f64 / total_us * 100.0;
        debug!(
            "body {body}: {} steps in {:.2} ms (compute {:.1}%, wait {:.1}%, write {:.1}%)",
            self.steps,
            self.total_time.as_secs_f64() * 1000.0,
            share(self.compute_time),
            share(self.wait_time),
            share(self.write_time),
        );
    }
}

/// Adds the elapsed time of a scope to a duration counter.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
