//! N-party rendezvous barrier with break, reset and cancel.
//!
//! Every call to [`RendezvousBarrier::wait`] belongs to a *generation*. The
//! generation completes when all parties have arrived; the last arrival is
//! the leader and the barrier moves on to the next generation. A generation
//! that cannot complete (a timed-out waiter or an explicit
//! [`abort`](RendezvousBarrier::abort)) leaves the barrier *broken*: every
//! waiter of that generation, and every later caller, gets
//! [`BarrierError::Broken`] until someone resets it.
//!
//! Arrival and release both go through the inner mutex, so everything a party
//! wrote before arriving is visible to every party after release.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{trace, warn};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error("barrier needs at least one party")]
    NoParties,
    #[error("barrier broken in generation {generation}")]
    Broken { generation: u64 },
    #[error("barrier cancelled")]
    Cancelled,
}

/// What a worker does after observing a broken barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Treat a break as fatal to the whole simulation.
    #[default]
    Escalate,
    /// Reset the barrier and carry on with the next round. A broken round
    /// lets some bodies move on while a peer is still reading, so the
    /// trajectory is no longer guaranteed to match
    /// [`ReferenceStepper`](crate::ReferenceStepper).
    Reset,
}

/// Returned to every party released from a completed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    generation: u64,
    leader: bool,
}

impl BarrierWaitResult {
    /// The generation that just completed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` for exactly one party per generation: the last to arrive.
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
    cancelled: bool,
    // Generations abandoned by a reset, with the number of their waiters
    // that have not woken up yet. Those waiters report Broken.
    abandoned: HashMap<u64, usize>,
}

impl BarrierState {
    /// Consumes one pending waiter of `generation` if a reset abandoned it.
    fn take_abandoned(&mut self, generation: u64) -> bool {
        let Some(pending) = self.abandoned.get_mut(&generation) else {
            return false;
        };
        *pending -= 1;
        if *pending == 0 {
            self.abandoned.remove(&generation);
        }
        true
    }
}

#[derive(Debug)]
pub struct RendezvousBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl RendezvousBarrier {
    pub fn new(parties: usize) -> Result<Self, BarrierError> {
        if parties == 0 {
            return Err(BarrierError::NoParties);
        }
        Ok(Self {
            parties,
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        })
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Current generation; increases by one per completed round and per reset.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Parties currently blocked in the open generation. Waiters leave the
    /// count when the generation completes, breaks or is cancelled.
    pub fn n_waiting(&self) -> usize {
        self.state.lock().arrived
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().broken
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Blocks until all parties have arrived in the current generation.
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        self.wait_inner(None)
    }

    /// Like [`wait`](Self::wait), but breaks the barrier if the generation
    /// does not complete within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<BarrierWaitResult, BarrierError> {
        self.wait_inner(Some(Instant::now() + timeout))
    }

    fn wait_inner(&self, deadline: Option<Instant>) -> Result<BarrierWaitResult, BarrierError> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(BarrierError::Cancelled);
        }
        if state.broken {
            return Err(BarrierError::Broken {
                generation: state.generation,
            });
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(BarrierWaitResult {
                generation,
                leader: true,
            });
        }

        loop {
            let timed_out = match deadline {
                Some(deadline) => self.released.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.released.wait(&mut state);
                    false
                }
            };

            // A completed generation wins over a cancel that raced the wakeup.
            if state.generation != generation {
                if state.take_abandoned(generation) {
                    return Err(BarrierError::Broken { generation });
                }
                return Ok(BarrierWaitResult {
                    generation,
                    leader: false,
                });
            }
            if state.cancelled {
                state.arrived -= 1;
                return Err(BarrierError::Cancelled);
            }
            if state.broken {
                state.arrived -= 1;
                return Err(BarrierError::Broken { generation });
            }
            if timed_out {
                warn!(
                    "barrier generation {generation} timed out with {}/{} parties",
                    state.arrived, self.parties
                );
                state.broken = true;
                state.arrived -= 1;
                self.released.notify_all();
                return Err(BarrierError::Broken { generation });
            }
        }
    }

    /// Marks the current generation broken and wakes every waiter.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if !state.broken {
            trace!("barrier generation {} aborted", state.generation);
            state.broken = true;
        }
        self.released.notify_all();
    }

    /// Returns the barrier to its initial, unbroken state and starts a new
    /// generation. Parties still blocked in the old generation get
    /// [`BarrierError::Broken`]. Also clears a cancellation.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        self.reset_locked(&mut state);
        self.released.notify_all();
    }

    /// Resets the barrier only if it is still broken in `generation`.
    ///
    /// Several parties that observed the same break can all call this; only
    /// the first one resets. Returns whether this call performed the reset.
    pub fn recover(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if !state.broken || state.generation != generation {
            return false;
        }
        self.reset_locked(&mut state);
        self.released.notify_all();
        true
    }

    /// Terminal shutdown: wakes every waiter and makes every future wait
    /// return [`BarrierError::Cancelled`] until [`reset`](Self::reset).
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.released.notify_all();
    }

    fn reset_locked(&self, state: &mut BarrierState) {
        if state.arrived > 0 {
            let generation = state.generation;
            state.abandoned.insert(generation, state.arrived);
        }
        state.arrived = 0;
        state.broken = false;
        state.cancelled = false;
        state.generation += 1;
    }
}
