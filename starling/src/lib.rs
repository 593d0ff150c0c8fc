// Starling Actor Scheduler
//
// This crate provides the runtime half of Starling: a scheduler with one
// cooperative main slot and a pool of worker slots, single-owner actors and
// cross-slot closure dispatch. The lifecycle and timer building blocks live in
// `starling-api` and are re-exported here.

pub mod actor;
pub mod config;
pub mod context;
mod envelope;
pub mod error;
pub mod guard;
pub mod logging;
mod mailbox;
mod registry;
pub mod scheduler;

// Re-export commonly used types
pub use actor::{Actor, ActorId, ActorOwn, send_closure_later};
pub use config::SchedulerConfig;
pub use context::Context;
pub use error::{SpawnError, SystemError};
pub use guard::MainGuard;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use starling_api::{
    ActorKey, ActorState, Liveness, PendingTimers, SlotId, TimerCallback, TimerDriver, TimerKey,
    TimerMultiplexer,
};
