use std::fmt;
use std::sync::MutexGuard;

use tracing::trace;

use crate::actor::{Actor, ActorId, ActorOwn};
use crate::error::SpawnError;
use crate::scheduler::SchedulerHandle;
use crate::scheduler::slot::SlotCore;

/// Exclusive access to the main slot's actors from the thread holding it.
///
/// Obtained from [`Scheduler::get_main_guard`](crate::Scheduler::get_main_guard).
/// While it is alive no main-slot pass can run, and because it wraps a
/// `MutexGuard` it cannot leave the thread that acquired it. The lock is
/// released when the guard is dropped, on every exit path.
pub struct MainGuard<'a> {
    core: MutexGuard<'a, SlotCore>,
}

impl<'a> MainGuard<'a> {
    pub(crate) fn new(core: MutexGuard<'a, SlotCore>) -> Self {
        Self { core }
    }

    /// Mutable access to a main-slot actor. `None` once the actor is past
    /// `Alive`, or if it lives on another slot.
    pub fn actor_mut<A: Actor>(&mut self, id: &ActorId<A>) -> Option<&mut A> {
        if id.slot() != self.core.id() {
            trace!(actor = %id.key(), slot = %id.slot(), "guard access to a foreign slot");
            return None;
        }
        self.core.actor_mut::<A>(id.key())
    }

    pub fn actor<A: Actor>(&mut self, id: &ActorId<A>) -> Option<&A> {
        if id.slot() != self.core.id() {
            return None;
        }
        self.core.actor_ref::<A>(id.key())
    }

    /// Creates an actor on the main slot. It is reachable through this guard
    /// right away; its `start_up` runs on the next pass.
    pub fn create_actor<A: Actor>(&mut self, name: impl Into<String>, actor: A) -> Result<ActorOwn<A>, SpawnError> {
        self.core.create_local(name.into(), actor)
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        self.core.scheduler()
    }
}

impl fmt::Debug for MainGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainGuard")
            .field("slot", &self.core.id())
            .field("actors", &self.core.actor_count())
            .finish()
    }
}
