use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces the duration of a labelled section.
pub struct TraceSpan<'a> {
    label: &'a str,
    start: Instant,
}

impl<'a> TraceSpan<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TraceSpan<'a> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            let elapsed = self.start.elapsed();
            log::trace!("end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Warns when shutdown took longer than `budget`.
pub fn warn_if_shutdown_slow(duration: Duration, budget: Duration) {
    if duration > budget {
        warn!(
            "shutdown took {:.2} ms (budget {:.2} ms)",
            duration.as_secs_f64() * 1000.0,
            budget.as_secs_f64() * 1000.0
        );
    }
}
