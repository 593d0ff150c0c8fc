//! # Starling API
//!
//! Leaf building blocks of the Starling actor scheduler. Nothing here knows
//! about threads or mailboxes:
//!
//! - **Lifecycle**: the `Alive -> Stopping -> Stopped` state machine of an actor
//!   and the read-only [`Liveness`] token derived from it
//! - **Timers**: the keyed [`TimerMultiplexer`] and the object-safe
//!   [`TimerDriver`] view the scheduler drives it through
//! - **Types**: slot and registry identities
//!
//! ## Module Organization
//!
//! - [`actor`]: lifecycle state
//! - [`timer`]: keyed timers
//! - [`types`]: common type definitions

pub mod actor;
pub mod timer;
pub mod types;

pub use actor::{ActorState, Lifecycle, Liveness};
pub use timer::{PendingTimers, TimerCallback, TimerDriver, TimerMultiplexer};
pub use types::{ActorKey, SlotId, TimerKey};
