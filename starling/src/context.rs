use std::any::TypeId;
use std::fmt;
use std::time::Instant;

use starling_api::{ActorKey, Liveness, SlotId};

use crate::actor::{Actor, ActorId, ActorOwn};
use crate::error::SpawnError;
use crate::scheduler::SchedulerHandle;
use crate::scheduler::slot::SlotCore;

/// Execution context handed to every actor hook and closure.
///
/// A `Context` only exists while its actor is executing on its slot, which is
/// what makes the self-handle escape hatch [`Context::actor_id`] sound.
pub struct Context<'a> {
    core: &'a mut SlotCore,
    key: ActorKey,
    liveness: Liveness,
    actor_type: TypeId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(core: &'a mut SlotCore, key: ActorKey, liveness: Liveness, actor_type: TypeId) -> Self {
        Self {
            core,
            key,
            liveness,
            actor_type,
        }
    }

    /// Typed handle to the executing actor, e.g. to reschedule its own timers
    /// or hand it out to others.
    ///
    /// `actor` must be the actor this context was created for. Debug builds
    /// panic on a type mismatch (caught and logged like any actor panic);
    /// release builds return a handle whose closures are dropped on delivery.
    pub fn actor_id<A: Actor>(&self, _actor: &A) -> ActorId<A> {
        debug_assert_eq!(
            TypeId::of::<A>(),
            self.actor_type,
            "actor_id requested as {} for a different actor type",
            std::any::type_name::<A>()
        );
        ActorId::new(
            self.key,
            self.core.id(),
            self.liveness.clone(),
            self.core.scheduler().clone(),
        )
    }

    pub fn key(&self) -> ActorKey {
        self.key
    }

    pub fn slot(&self) -> SlotId {
        self.core.id()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Whether the actor's owner has been reset while this step runs.
    pub fn is_stopping(&self) -> bool {
        !self.liveness.is_alive()
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        self.core.scheduler()
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Ends the current scheduling pass right after this step. Items still
    /// waiting in any mailbox of this slot run on the next pass.
    pub fn yield_now(&mut self) {
        self.core.request_yield();
    }

    /// Creates an actor on the current slot. It is installed immediately and
    /// starts up later in this pass.
    pub fn create_actor<B: Actor>(
        &mut self,
        name: impl Into<String>,
        actor: B,
    ) -> Result<ActorOwn<B>, SpawnError> {
        self.core.create_local(name.into(), actor)
    }

    pub fn create_actor_on<B: Actor>(
        &mut self,
        slot: SlotId,
        name: impl Into<String>,
        actor: B,
    ) -> Result<ActorOwn<B>, SpawnError> {
        if slot == self.core.id() {
            self.core.create_local(name.into(), actor)
        } else {
            self.core.scheduler().create_actor_on(slot, name, actor)
        }
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("actor", &self.key)
            .field("slot", &self.core.id())
            .finish()
    }
}
