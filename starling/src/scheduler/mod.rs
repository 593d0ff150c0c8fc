//! # Scheduler Module
//!
//! One cooperative main slot, driven by the host through [`Scheduler::run_main`],
//! plus `worker_threads` worker slots, each on its own OS thread.
//!
//! ## Key Concepts
//! - Slots: every actor is pinned to one slot for its whole life; only the
//!   thread driving that slot ever runs the actor
//! - Delivery: every slot has one inbound channel; envelopes from any thread
//!   land there and are moved into the target actor's mailbox
//! - Passes: a pass moves delivered envelopes into mailboxes, drains ready
//!   mailboxes and fires due timers
//!
//! ## Lifecycle
//! `init` -> `start` -> repeated `run_main` -> `finish`

pub(crate) mod slot;
mod worker;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use flume::{Receiver, Sender};
use starling_api::{ActorKey, Lifecycle, SlotId};
use tracing::{info, warn};

use crate::actor::{Actor, ActorId, ActorOwn};
use crate::config::SchedulerConfig;
use crate::envelope::Envelope;
use crate::error::{SpawnError, SystemError};
use crate::guard::MainGuard;
use crate::registry::Registry;
use crate::{log_error, log_scheduler, logging};

use self::slot::SlotCore;
use self::worker::Worker;

/// State reachable from every thread of one scheduler instance.
struct Shared {
    senders: Vec<Sender<Envelope>>,
    registry: Mutex<Registry>,
    finish_requested: AtomicBool,
    next_worker: AtomicUsize,
}

/// Cloneable capability to a running scheduler.
///
/// Handed to actors through their `Context` and usable from any thread: it is
/// how code inside the runtime requests `finish` or creates actors without any
/// process-global "current scheduler".
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Requests shutdown. `run_main` returns `false` from now on and new actors
    /// are refused; the owner of the `Scheduler` completes it with `finish`.
    pub fn finish(&self) {
        if !self.shared.finish_requested.swap(true, Ordering::AcqRel) {
            info!("scheduler finish requested");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.shared.finish_requested.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.shared.senders.len() - 1
    }

    pub fn slot_count(&self) -> usize {
        self.shared.senders.len()
    }

    /// Actors created and not yet stopped.
    pub fn live_actor_count(&self) -> usize {
        self.registry().live()
    }

    /// Slot `key` lives on, `None` once the actor has stopped.
    pub fn slot_of(&self, key: ActorKey) -> Option<SlotId> {
        self.registry().slot_of(key)
    }

    /// Creates an actor on the next worker slot (round-robin), or on the main
    /// slot when there are no workers.
    pub fn create_actor<A: Actor>(&self, name: impl Into<String>, actor: A) -> Result<ActorOwn<A>, SpawnError> {
        self.create_actor_on(self.pick_slot(), name, actor)
    }

    /// Creates an actor on `slot`. It is installed when the slot processes its
    /// channel, ahead of anything sent to it afterwards.
    pub fn create_actor_on<A: Actor>(
        &self,
        slot: SlotId,
        name: impl Into<String>,
        actor: A,
    ) -> Result<ActorOwn<A>, SpawnError> {
        if self.is_finished() {
            return Err(SpawnError::SystemShutdown);
        }
        let key = self.register(slot)?;
        let lifecycle = Lifecycle::new();
        let id = ActorId::new(key, slot, lifecycle.watch(), self.clone());
        let envelope = Envelope::Spawn {
            key,
            name: name.into(),
            lifecycle: lifecycle.clone(),
            actor: Box::new(actor),
        };
        if !self.route(slot, envelope) {
            self.unregister(key);
            return Err(SpawnError::SystemShutdown);
        }
        Ok(ActorOwn::new(id, lifecycle))
    }

    fn pick_slot(&self) -> SlotId {
        let workers = self.worker_count();
        if workers == 0 {
            return SlotId::MAIN;
        }
        let next = self.shared.next_worker.fetch_add(1, Ordering::Relaxed);
        SlotId::worker(next % workers)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, slot: SlotId) -> Result<ActorKey, SpawnError> {
        if slot.index() >= self.slot_count() {
            return Err(SpawnError::InvalidSlot {
                slot,
                slots: self.slot_count(),
            });
        }
        self.registry()
            .allocate(slot)
            .ok_or(SpawnError::RegistryExhausted)
    }

    pub(crate) fn unregister(&self, key: ActorKey) {
        self.registry().release(key);
    }

    /// Hands an envelope to a slot. `false` once the slot has shut down.
    pub(crate) fn route(&self, slot: SlotId, envelope: Envelope) -> bool {
        self.shared
            .senders
            .get(slot.index())
            .is_some_and(|sender| sender.send(envelope).is_ok())
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("slots", &self.slot_count())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RunState {
    Initialized = 0,
    Running = 1,
    Finished = 2,
}

/// Owns the worker pool and the main slot.
///
/// The host drives the main slot from its own thread:
///
/// ```rust
/// use std::time::Duration;
/// use starling::Scheduler;
///
/// let mut scheduler = Scheduler::init(2).expect("valid config");
/// scheduler.start().expect("workers spawned");
/// scheduler.handle().finish();
/// while scheduler.run_main(Duration::from_millis(10)) {}
/// scheduler.finish().expect("clean shutdown");
/// ```
pub struct Scheduler {
    config: SchedulerConfig,
    handle: SchedulerHandle,
    main: Mutex<SlotCore>,
    main_inbox: Receiver<Envelope>,
    /// Worker channels not yet handed to a thread.
    pending: Mutex<Vec<(SlotId, Receiver<Envelope>)>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    state: AtomicU8,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("state", &self.run_state())
            .finish()
    }
}

impl Scheduler {
    /// Configures a scheduler with `worker_count` worker threads. No thread is
    /// started yet.
    pub fn init(worker_count: usize) -> Result<Self, SystemError> {
        Self::with_config(SchedulerConfig::default().with_worker_threads(worker_count))
    }

    pub fn with_config(config: SchedulerConfig) -> Result<Self, SystemError> {
        config.validate()?;

        let mut senders = Vec::with_capacity(config.slot_count());
        let mut receivers = Vec::with_capacity(config.slot_count());
        for _ in 0..config.slot_count() {
            let (sender, receiver) = flume::unbounded();
            senders.push(sender);
            receivers.push(receiver);
        }
        let handle = SchedulerHandle {
            shared: Arc::new(Shared {
                senders,
                registry: Mutex::new(Registry::default()),
                finish_requested: AtomicBool::new(false),
                next_worker: AtomicUsize::new(0),
            }),
        };

        let mut receivers = receivers.into_iter().enumerate();
        let main_inbox = match receivers.next() {
            Some((_, receiver)) => receiver,
            None => return Err(SystemError::ConfigError("scheduler has no main slot".to_string())),
        };
        let pending = receivers
            .map(|(index, receiver)| (SlotId::new(index), receiver))
            .collect();

        log_scheduler!(SlotId::MAIN, "initialized", workers = config.worker_threads);
        Ok(Self {
            main: Mutex::new(SlotCore::new(
                SlotId::MAIN,
                handle.clone(),
                config.max_closures_per_pass,
            )),
            main_inbox,
            pending: Mutex::new(pending),
            workers: Mutex::new(Vec::new()),
            state: AtomicU8::new(RunState::Initialized as u8),
            handle,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    fn run_state(&self) -> RunState {
        match self.state.load(Ordering::Acquire) {
            0 => RunState::Initialized,
            1 => RunState::Running,
            _ => RunState::Finished,
        }
    }

    /// Spawns the worker threads.
    pub fn start(&mut self) -> Result<(), SystemError> {
        match self.run_state() {
            RunState::Initialized => {}
            RunState::Running => return Err(SystemError::AlreadyStarted),
            RunState::Finished => return Err(SystemError::ShuttingDown),
        }

        let dispatcher = logging::current_subscriber();
        let pending = std::mem::take(
            &mut *self
                .pending
                .lock()
                .map_err(|_| SystemError::Other(anyhow!("Failed to acquire pending slots lock")))?,
        );
        let mut handles = Vec::with_capacity(pending.len());
        let mut remaining = pending.into_iter();
        while let Some((slot, inbox)) = remaining.next() {
            let core = SlotCore::new(slot, self.handle.clone(), self.config.max_closures_per_pass);
            let idle_wait = self.config.idle_wait;
            let dispatcher = dispatcher.clone();
            let thread_name = format!("{}-{}", self.config.thread_name_prefix, slot.index() - 1);

            let spawned = thread::Builder::new().name(thread_name).spawn(move || {
                let _log_guard = tracing::dispatcher::set_default(&dispatcher);
                Worker::new(core, inbox, idle_wait).run();
            });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    let error = SystemError::Other(anyhow!("Failed to spawn worker thread for slot {}: {}", slot, e));
                    log_error!(error, slot = %slot);
                    // Unwind what was started so the scheduler is left finished.
                    self.handle.finish();
                    self.stop_workers(handles);
                    let leftover: Vec<_> = remaining.collect();
                    self.shutdown_unstarted(leftover);
                    self.shutdown_main();
                    self.state.store(RunState::Finished as u8, Ordering::Release);
                    return Err(error);
                }
            }
        }

        *self
            .workers
            .lock()
            .map_err(|_| SystemError::Other(anyhow!("Failed to acquire workers lock")))? = handles;
        self.state.store(RunState::Running as u8, Ordering::Release);
        log_scheduler!(SlotId::MAIN, "started", workers = self.config.worker_threads);
        Ok(())
    }

    /// Runs one pass of the main slot on the calling thread.
    ///
    /// When nothing is ready the call first blocks for up to `max_wait`, less
    /// if a main-slot timer is due earlier, or until something is delivered.
    /// Returns `false` once finish has been requested.
    pub fn run_main(&self, max_wait: Duration) -> bool {
        if self.handle.is_finished() || self.run_state() == RunState::Finished {
            return false;
        }

        let mut core = match self.lock_main() {
            Ok(core) => core,
            Err(e) => {
                log_error!(e, slot = %SlotId::MAIN);
                return false;
            }
        };

        let mut delivered = None;
        if !core.has_ready() && self.main_inbox.is_empty() {
            let now = Instant::now();
            let wait = core
                .next_deadline()
                .map_or(max_wait, |deadline| deadline.saturating_duration_since(now).min(max_wait));
            if !wait.is_zero() {
                // Let guard holders in while we sleep.
                drop(core);
                delivered = self.main_inbox.recv_timeout(wait).ok();
                core = match self.lock_main() {
                    Ok(core) => core,
                    Err(e) => {
                        log_error!(e, slot = %SlotId::MAIN);
                        return false;
                    }
                };
            }
        }

        if let Some(envelope) = delivered {
            let _ = core.accept(envelope);
        }
        while let Ok(envelope) = self.main_inbox.try_recv() {
            let _ = core.accept(envelope);
        }
        let outcome = core.drain();
        if !outcome.yielded {
            core.fire_timers(Instant::now());
        }
        drop(core);

        !self.handle.is_finished()
    }

    /// Acquires exclusive access to main-slot actor state.
    ///
    /// Blocks while another thread holds the guard or while `run_main` is in
    /// the middle of a pass. Must not be called by a thread already holding it.
    pub fn get_main_guard(&self) -> Result<MainGuard<'_>, SystemError> {
        Ok(MainGuard::new(self.lock_main()?))
    }

    /// See [`SchedulerHandle::create_actor`].
    pub fn create_actor<A: Actor>(&self, name: impl Into<String>, actor: A) -> Result<ActorOwn<A>, SpawnError> {
        self.handle.create_actor(name, actor)
    }

    /// See [`SchedulerHandle::create_actor_on`].
    pub fn create_actor_on<A: Actor>(
        &self,
        slot: SlotId,
        name: impl Into<String>,
        actor: A,
    ) -> Result<ActorOwn<A>, SpawnError> {
        self.handle.create_actor_on(slot, name, actor)
    }

    /// Orderly shutdown: refuse new work, drain what every slot still holds,
    /// tear all actors down and join the workers. Later calls are no-ops.
    pub fn finish(&mut self) -> Result<(), SystemError> {
        if self.run_state() == RunState::Finished {
            return Ok(());
        }
        self.handle.finish();

        let handles = std::mem::take(
            &mut *self
                .workers
                .lock()
                .map_err(|_| SystemError::Other(anyhow!("Failed to acquire workers lock")))?,
        );
        let panicked = self.stop_workers(handles);

        let unstarted = std::mem::take(
            &mut *self
                .pending
                .lock()
                .map_err(|_| SystemError::Other(anyhow!("Failed to acquire pending slots lock")))?,
        );
        self.shutdown_unstarted(unstarted);
        self.shutdown_main();

        self.state.store(RunState::Finished as u8, Ordering::Release);
        log_scheduler!(SlotId::MAIN, "finished", live_actors = self.handle.live_actor_count());

        if panicked > 0 {
            return Err(SystemError::ShutdownError(format!(
                "{} worker thread(s) panicked",
                panicked
            )));
        }
        Ok(())
    }

    /// Sends `Stop` to every worker and joins it. Returns how many panicked.
    fn stop_workers(&self, handles: Vec<JoinHandle<()>>) -> usize {
        for slot in (0..handles.len()).map(SlotId::worker) {
            self.handle.route(slot, Envelope::Stop);
        }
        let mut panicked = 0;
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(thread = %name, "worker thread terminated with a panic");
                panicked += 1;
            }
        }
        panicked
    }

    /// Slots whose thread never started are drained on the calling thread.
    fn shutdown_unstarted(&self, unstarted: Vec<(SlotId, Receiver<Envelope>)>) {
        for (slot, inbox) in unstarted {
            let mut core = SlotCore::new(slot, self.handle.clone(), self.config.max_closures_per_pass);
            core.shutdown(&inbox);
        }
    }

    fn shutdown_main(&self) {
        match self.lock_main() {
            Ok(mut core) => core.shutdown(&self.main_inbox),
            Err(e) => log_error!(e, slot = %SlotId::MAIN),
        }
    }

    fn lock_main(&self) -> Result<MutexGuard<'_, SlotCore>, SystemError> {
        self.main
            .lock()
            .map_err(|_| SystemError::Other(anyhow!("Failed to acquire main slot lock")))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log_error!(e);
        }
    }
}
