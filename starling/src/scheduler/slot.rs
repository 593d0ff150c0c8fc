use std::any::Any;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use downcast_rs::Downcast;
use flume::Receiver;
use starling_api::{ActorKey, Lifecycle, Liveness, SlotId};
use tracing::trace;

use crate::actor::{Actor, ActorId, ActorOwn};
use crate::context::Context;
use crate::envelope::{Envelope, MailItem};
use crate::error::SpawnError;
use crate::mailbox::{Mailbox, ReadyQueue};
use crate::scheduler::SchedulerHandle;
use crate::{log_error, log_lifecycle, log_scheduler, log_timer};

/// An installed actor together with its private mailbox.
struct ActorCell {
    name: String,
    generation: u32,
    lifecycle: Lifecycle,
    /// Taken out while the actor executes.
    actor: Option<Box<dyn Actor>>,
    mailbox: Mailbox,
}

/// Result of one drain over a slot's ready actors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassOutcome {
    pub executed: usize,
    pub yielded: bool,
}

/// Everything a thread slot owns: its actors, their mailboxes and the queue of
/// actors with pending items.
///
/// Exactly one thread drives a `SlotCore` at a time. Worker threads own theirs
/// outright; the main slot's core sits behind the mutex the `MainGuard` locks.
pub(crate) struct SlotCore {
    id: SlotId,
    scheduler: SchedulerHandle,
    cells: HashMap<u32, ActorCell>,
    ready: ReadyQueue,
    yield_requested: bool,
    max_closures_per_pass: usize,
}

fn lookup(cells: &mut HashMap<u32, ActorCell>, key: ActorKey) -> Option<&mut ActorCell> {
    cells
        .get_mut(&key.index)
        .filter(|cell| cell.generation == key.generation)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl SlotCore {
    pub(crate) fn new(id: SlotId, scheduler: SchedulerHandle, max_closures_per_pass: usize) -> Self {
        Self {
            id,
            scheduler,
            cells: HashMap::new(),
            ready: ReadyQueue::default(),
            yield_requested: false,
            max_closures_per_pass,
        }
    }

    pub(crate) fn id(&self) -> SlotId {
        self.id
    }

    pub(crate) fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub(crate) fn request_yield(&mut self) {
        self.yield_requested = true;
    }

    pub(crate) fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub(crate) fn actor_count(&self) -> usize {
        self.cells.len()
    }

    /// Takes one envelope off the slot channel. `Break` means the worker was
    /// told to stop.
    pub(crate) fn accept(&mut self, envelope: Envelope) -> ControlFlow<()> {
        match envelope {
            Envelope::Spawn {
                key,
                name,
                lifecycle,
                actor,
            } => self.install(key, name, lifecycle, actor),
            Envelope::Closure { key, job } => self.deliver(key, MailItem::Closure(job)),
            Envelope::TearDown { key } => self.deliver(key, MailItem::TearDown),
            Envelope::Stop => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn install(&mut self, key: ActorKey, name: String, lifecycle: Lifecycle, actor: Box<dyn Actor>) {
        let mut mailbox = Mailbox::default();
        mailbox.push(MailItem::StartUp);
        mailbox.mark_scheduled();
        log_lifecycle!(name, key, "installed", slot = %self.id);
        self.cells.insert(
            key.index,
            ActorCell {
                name,
                generation: key.generation,
                lifecycle,
                actor: Some(actor),
                mailbox,
            },
        );
        self.ready.push_back(key);
    }

    /// Registers and installs an actor on this very slot.
    pub(crate) fn create_local<A: Actor>(&mut self, name: String, actor: A) -> Result<ActorOwn<A>, SpawnError> {
        if self.scheduler.is_finished() {
            return Err(SpawnError::SystemShutdown);
        }
        let key = self.scheduler.register(self.id)?;
        let lifecycle = Lifecycle::new();
        let id = ActorId::new(key, self.id, lifecycle.watch(), self.scheduler.clone());
        self.install(key, name, lifecycle.clone(), Box::new(actor));
        Ok(ActorOwn::new(id, lifecycle))
    }

    fn deliver(&mut self, key: ActorKey, item: MailItem) {
        match lookup(&mut self.cells, key) {
            Some(cell) => {
                cell.mailbox.push(item);
                if cell.mailbox.mark_scheduled() {
                    self.ready.push_back(key);
                }
            }
            None => trace!(actor = %key, slot = %self.id, ?item, "dropping item for stopped actor"),
        }
    }

    /// Runs ready mailboxes until none is left or an actor yields.
    pub(crate) fn drain(&mut self) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        while let Some(key) = self.ready.pop() {
            let mut budget = self.max_closures_per_pass;
            loop {
                let Some(cell) = lookup(&mut self.cells, key) else {
                    break;
                };
                let Some(item) = cell.mailbox.pop() else {
                    cell.mailbox.clear_scheduled();
                    break;
                };
                self.execute(key, item);
                outcome.executed += 1;
                budget -= 1;

                if self.yield_requested {
                    self.yield_requested = false;
                    if let Some(cell) = lookup(&mut self.cells, key) {
                        if cell.mailbox.is_empty() {
                            cell.mailbox.clear_scheduled();
                        } else {
                            self.ready.push_front(key);
                        }
                    }
                    outcome.yielded = true;
                    log_scheduler!(self.id, "yielded", executed = outcome.executed, still_ready = self.ready.len());
                    return outcome;
                }
                if budget == 0 {
                    if let Some(cell) = lookup(&mut self.cells, key) {
                        if cell.mailbox.is_empty() {
                            cell.mailbox.clear_scheduled();
                        } else {
                            self.ready.push_back(key);
                        }
                    }
                    break;
                }
            }
        }
        outcome
    }

    fn execute(&mut self, key: ActorKey, item: MailItem) {
        match item {
            MailItem::StartUp => {
                self.with_actor(key, |actor, ctx| actor.start_up(ctx));
            }
            MailItem::Closure(job) => {
                self.with_actor(key, move |actor, ctx| job(actor, ctx));
            }
            MailItem::TearDown => self.tear_down(key),
        }
    }

    fn with_actor<F>(&mut self, key: ActorKey, f: F)
    where
        F: for<'c> FnOnce(&mut Box<dyn Actor>, &mut Context<'c>),
    {
        let Some(cell) = lookup(&mut self.cells, key) else {
            return;
        };
        let Some(mut actor) = cell.actor.take() else {
            return;
        };
        let liveness = cell.lifecycle.watch();
        let name = cell.name.clone();

        self.run_isolated(key, &name, &mut actor, liveness, f);

        if let Some(cell) = lookup(&mut self.cells, key) {
            cell.actor = Some(actor);
        }
    }

    fn run_isolated<F>(&mut self, key: ActorKey, name: &str, actor: &mut Box<dyn Actor>, liveness: Liveness, f: F)
    where
        F: for<'c> FnOnce(&mut Box<dyn Actor>, &mut Context<'c>),
    {
        let slot = self.id;
        let span = crate::actor_span!(name, key, slot = %slot);
        let _entered = span.enter();
        let actor_type = Any::type_id((**actor).as_any());
        let mut ctx = Context::new(self, key, liveness, actor_type);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(actor, &mut ctx))) {
            log_error!(panic_message(payload.as_ref()), actor = %name, key = %key, slot = %slot);
        }
    }

    /// Final step of an actor: runs `tear_down`, drops it with its timers and
    /// marks it stopped. Whatever is still queued for it is discarded.
    fn tear_down(&mut self, key: ActorKey) {
        if lookup(&mut self.cells, key).is_none() {
            return;
        }
        let Some(mut cell) = self.cells.remove(&key.index) else {
            return;
        };
        cell.lifecycle.begin_stopping();
        if let Some(mut actor) = cell.actor.take() {
            self.run_isolated(key, &cell.name, &mut actor, cell.lifecycle.watch(), |actor, ctx| {
                actor.tear_down(ctx)
            });
            drop(actor);
        }
        self.scheduler.unregister(key);
        cell.lifecycle.mark_stopped();
        log_lifecycle!(cell.name, key, "stopped", slot = %self.id, discarded = cell.mailbox.len());
    }

    /// Fires due timers of every alive actor. Actors past `Alive` are fenced.
    /// A panicking callback is logged; entries still due fire on a later pass.
    pub(crate) fn fire_timers(&mut self, now: Instant) -> usize {
        let slot = self.id;
        let mut fired = 0;
        for (index, cell) in self.cells.iter_mut() {
            if !cell.lifecycle.is_alive() {
                continue;
            }
            let Some(actor) = cell.actor.as_mut() else {
                continue;
            };
            let key = ActorKey::new(*index, cell.generation);
            let span = crate::actor_span!(cell.name, key, slot = %slot);
            let _entered = span.enter();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut count = 0;
                actor.visit_timers(&mut |timers| count += timers.run_once(now));
                count
            }));
            match outcome {
                Ok(count) => fired += count,
                Err(payload) => {
                    log_error!(panic_message(payload.as_ref()), actor = %cell.name, key = %key, slot = %slot);
                }
            }
        }
        if fired > 0 {
            log_timer!(slot, "fired", count = fired);
        }
        fired
    }

    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        let mut next: Option<Instant> = None;
        for cell in self.cells.values_mut() {
            if !cell.lifecycle.is_alive() {
                continue;
            }
            if let Some(actor) = cell.actor.as_mut() {
                actor.visit_timers(&mut |timers| {
                    if let Some(deadline) = timers.next_deadline() {
                        next = Some(next.map_or(deadline, |current| current.min(deadline)));
                    }
                });
            }
        }
        next
    }

    pub(crate) fn actor_mut<A: Actor>(&mut self, key: ActorKey) -> Option<&mut A> {
        let cell = lookup(&mut self.cells, key)?;
        if !cell.lifecycle.is_alive() {
            return None;
        }
        cell.actor.as_mut()?.downcast_mut::<A>()
    }

    pub(crate) fn actor_ref<A: Actor>(&mut self, key: ActorKey) -> Option<&A> {
        self.actor_mut::<A>(key).map(|actor| &*actor)
    }

    /// Drains what is left for this slot and tears every actor down.
    pub(crate) fn shutdown(&mut self, inbox: &Receiver<Envelope>) {
        while let Ok(envelope) = inbox.try_recv() {
            // A stray Stop changes nothing here.
            let _ = self.accept(envelope);
        }
        while self.has_ready() {
            self.drain();
        }
        let keys: Vec<ActorKey> = self
            .cells
            .iter()
            .map(|(index, cell)| ActorKey::new(*index, cell.generation))
            .collect();
        let count = keys.len();
        for key in keys {
            self.tear_down(key);
        }
        log_scheduler!(self.id, "shut_down", torn_down = count);
    }
}
