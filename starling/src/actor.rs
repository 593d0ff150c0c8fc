use std::fmt;
use std::marker::PhantomData;

use downcast_rs::{Downcast, impl_downcast};
use starling_api::{ActorKey, ActorState, Lifecycle, Liveness, SlotId, TimerDriver, TimerMultiplexer};
use tracing::{debug, trace};

use crate::context::Context;
use crate::envelope::{self, Envelope};
use crate::scheduler::SchedulerHandle;

/// A unit of strictly sequential execution.
///
/// Every hook and every closure sent to an actor runs on the thread owning the
/// actor's slot, one at a time, so actor state needs no locking.
pub trait Actor: Downcast + Send + 'static {
    /// First item executed on the slot after the actor is installed.
    fn start_up(&mut self, _ctx: &mut Context<'_>) {}

    /// Last item executed before the actor is dropped.
    fn tear_down(&mut self, _ctx: &mut Context<'_>) {}

    /// Exposes the timer multiplexers this actor owns so its slot can size its
    /// waits and fire due entries.
    fn visit_timers(&mut self, _visit: &mut dyn FnMut(&mut dyn TimerDriver)) {}
}
impl_downcast!(Actor);

/// A standalone multiplexer can be installed as an actor of its own.
impl<C: Send + 'static> Actor for TimerMultiplexer<C> {
    fn visit_timers(&mut self, visit: &mut dyn FnMut(&mut dyn TimerDriver)) {
        visit(self);
    }
}

/// Non-owning reference to an actor.
///
/// Cloning is cheap and the handle may be stored anywhere, including other
/// actors on other slots. It never keeps the actor alive.
pub struct ActorId<A: Actor> {
    key: ActorKey,
    slot: SlotId,
    liveness: Liveness,
    scheduler: SchedulerHandle,
    _actor: PhantomData<fn() -> A>,
}

impl<A: Actor> ActorId<A> {
    pub(crate) fn new(key: ActorKey, slot: SlotId, liveness: Liveness, scheduler: SchedulerHandle) -> Self {
        Self {
            key,
            slot,
            liveness,
            scheduler,
            _actor: PhantomData,
        }
    }

    pub fn key(&self) -> ActorKey {
        self.key
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn state(&self) -> ActorState {
        self.liveness.state()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Liveness token, e.g. to fence a timer multiplexer owned by this actor.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Enqueues `f` on the actor's mailbox and returns immediately.
    ///
    /// Closures sent from one sender to one target run in send order. A closure
    /// that reaches a stopped actor is dropped without running.
    pub fn send_closure_later<F>(&self, f: F)
    where
        F: for<'c> FnOnce(&mut A, &mut Context<'c>) + Send + 'static,
    {
        if self.liveness.is_stopped() {
            trace!(actor = %self.key, "dropping closure for stopped actor");
            return;
        }
        let key = self.key;
        let job = envelope::job(move |actor, ctx| match (**actor).downcast_mut::<A>() {
            Some(actor) => f(actor, ctx),
            None => debug!(actor = %key, "closure target has an unexpected type"),
        });
        if !self.scheduler.route(self.slot, Envelope::Closure { key, job }) {
            trace!(actor = %key, slot = %self.slot, "slot no longer accepts closures");
        }
    }
}

/// Free-function form of [`ActorId::send_closure_later`].
pub fn send_closure_later<A, F>(target: &ActorId<A>, f: F)
where
    A: Actor,
    F: for<'c> FnOnce(&mut A, &mut Context<'c>) + Send + 'static,
{
    target.send_closure_later(f);
}

impl<A: Actor> Clone for ActorId<A> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            slot: self.slot,
            liveness: self.liveness.clone(),
            scheduler: self.scheduler.clone(),
            _actor: PhantomData,
        }
    }
}

impl<A: Actor> PartialEq for ActorId<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<A: Actor> Eq for ActorId<A> {}

impl<A: Actor> fmt::Debug for ActorId<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorId")
            .field("key", &self.key)
            .field("slot", &self.slot)
            .field("state", &self.state())
            .finish()
    }
}

/// The single owner of an actor.
///
/// Dropping or resetting it starts the actor's teardown: the state moves to
/// `Stopping`, a teardown item is queued behind everything already in the
/// actor's mailbox, and once it has run on the slot the state is `Stopped`.
pub struct ActorOwn<A: Actor> {
    inner: Option<(ActorId<A>, Lifecycle)>,
}

impl<A: Actor> ActorOwn<A> {
    pub(crate) fn new(id: ActorId<A>, lifecycle: Lifecycle) -> Self {
        Self {
            inner: Some((id, lifecycle)),
        }
    }

    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Non-owning handle to the owned actor.
    pub fn get(&self) -> Option<ActorId<A>> {
        self.id().cloned()
    }

    pub fn id(&self) -> Option<&ActorId<A>> {
        self.inner.as_ref().map(|(id, _)| id)
    }

    /// Gives up ownership without stopping the actor. It keeps running until
    /// the scheduler finishes.
    pub fn release(mut self) -> Option<ActorId<A>> {
        self.inner.take().map(|(id, _)| id)
    }

    pub fn reset(&mut self) {
        let Some((id, lifecycle)) = self.inner.take() else {
            return;
        };
        if !lifecycle.begin_stopping() {
            return;
        }
        debug!(actor = %id.key, slot = %id.slot, "actor owner reset");
        if !id.scheduler.route(id.slot, Envelope::TearDown { key: id.key }) {
            // The slot has already shut down and torn everything down.
            trace!(actor = %id.key, "teardown after slot shutdown");
        }
    }
}

impl<A: Actor> Drop for ActorOwn<A> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<A: Actor> fmt::Debug for ActorOwn<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorOwn").field("id", &self.id()).finish()
    }
}
