//! Utility helpers: trace logging spans and per-worker profiling.

pub mod logging;
pub mod profiling;

pub use logging::TraceSpan;
pub use profiling::{ScopedTimer, WorkerProfile};
