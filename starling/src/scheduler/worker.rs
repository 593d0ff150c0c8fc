use std::fmt;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError};

use crate::envelope::Envelope;
use crate::log_scheduler;
use crate::scheduler::slot::SlotCore;

/// # Worker Thread Implementation
///
/// Drives one worker slot on its own OS thread.
///
/// ## Core Algorithm
/// 1. Block on the slot channel, at most until the nearest timer deadline
///    (capped by `idle_wait`), unless actors are already ready
/// 2. Move every delivered envelope into its actor's mailbox
/// 3. Drain ready mailboxes until empty or an actor yields
/// 4. Fire due timers
/// 5. Repeat until a `Stop` envelope arrives, then drain what is left and tear
///    every actor down
pub(crate) struct Worker {
    core: SlotCore,
    inbox: Receiver<Envelope>,
    idle_wait: Duration,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("slot", &self.core.id())
            .field("actors", &self.core.actor_count())
            .field("idle_wait", &self.idle_wait)
            .finish()
    }
}

impl Worker {
    pub(crate) fn new(core: SlotCore, inbox: Receiver<Envelope>, idle_wait: Duration) -> Self {
        Self {
            core,
            inbox,
            idle_wait,
        }
    }

    pub(crate) fn run(mut self) {
        log_scheduler!(self.core.id(), "started");
        loop {
            if self.wait_and_intake().is_break() {
                break;
            }
            self.core.drain();
            self.core.fire_timers(Instant::now());
        }
        self.core.shutdown(&self.inbox);
        log_scheduler!(self.core.id(), "stopped");
    }

    fn wait_and_intake(&mut self) -> ControlFlow<()> {
        if !self.core.has_ready() {
            let wait = self
                .core
                .next_deadline()
                .map_or(self.idle_wait, |deadline| {
                    deadline.saturating_duration_since(Instant::now()).min(self.idle_wait)
                });
            match self.inbox.recv_timeout(wait) {
                Ok(envelope) => self.core.accept(envelope)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return ControlFlow::Break(()),
            }
        }
        while let Ok(envelope) = self.inbox.try_recv() {
            self.core.accept(envelope)?;
        }
        ControlFlow::Continue(())
    }
}
