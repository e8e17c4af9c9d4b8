//! Synchronization primitives shared by the integration workers.

pub mod barrier;
pub mod stop;

pub use barrier::{BarrierError, BarrierWaitResult, RecoveryPolicy, RendezvousBarrier};
pub use stop::StopToken;
