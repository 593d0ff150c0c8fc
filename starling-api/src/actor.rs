//! Actor lifecycle state shared between an actor's owner, its slot and every
//! non-owning handle.
//!
//! The state machine is strictly monotonic:
//!
//! ```text
//! Alive --(owner reset)--> Stopping --(teardown ran on the slot)--> Stopped
//! ```
//!
//! [`Lifecycle`] is the side allowed to move the state forward, [`Liveness`]
//! is the read-only view handed to timers and non-owning references.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Actor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActorState {
    Alive = 0,
    Stopping = 1,
    Stopped = 2,
}

impl ActorState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ActorState::Alive,
            1 => ActorState::Stopping,
            _ => ActorState::Stopped,
        }
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorState::Alive => "alive",
            ActorState::Stopping => "stopping",
            ActorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Owner-side handle of an actor's state machine.
///
/// Held by the actor's cell on its slot and by its `ActorOwn`.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<AtomicU8>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ActorState::Alive as u8)),
        }
    }

    pub fn state(&self) -> ActorState {
        ActorState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_alive(&self) -> bool {
        self.state() == ActorState::Alive
    }

    /// Moves `Alive -> Stopping`. Returns `false` if teardown had already begun.
    pub fn begin_stopping(&self) -> bool {
        self.state
            .compare_exchange(
                ActorState::Alive as u8,
                ActorState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Final transition, performed once teardown has run on the actor's slot.
    pub fn mark_stopped(&self) {
        self.state.store(ActorState::Stopped as u8, Ordering::Release);
    }

    /// Read-only view of this lifecycle.
    pub fn watch(&self) -> Liveness {
        Liveness {
            state: Arc::clone(&self.state),
        }
    }
}

/// Read-only liveness token.
///
/// Cheap to clone and safe to consult from any thread.
#[derive(Clone)]
pub struct Liveness {
    state: Arc<AtomicU8>,
}

impl Liveness {
    pub fn state(&self) -> ActorState {
        ActorState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_alive(&self) -> bool {
        self.state() == ActorState::Alive
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ActorState::Stopped
    }
}

impl fmt::Debug for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Liveness")
            .field("state", &self.state())
            .finish()
    }
}
