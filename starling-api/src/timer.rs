//! # Keyed timer multiplexer
//!
//! A [`TimerMultiplexer`] keeps at most one pending deadline per [`TimerKey`]
//! and routes every expiry into a single callback shared by all keys.
//!
//! ## Firing rules
//! - Entries fire in ascending `(deadline, key)` order.
//! - An entry is removed from the pending set *before* its callback runs, so
//!   the callback cannot observe or cancel its own firing.
//! - The callback receives the pending set and may cancel or (re)schedule any
//!   key, including its own. Entries scheduled while a pass is running are
//!   fresh schedules and never fire in that same pass, even if already due.
//! - When the multiplexer is fenced by an owner [`Liveness`] and the owner is no
//!   longer alive, nothing fires and nothing can be scheduled any more.
//!
//! ## Threading
//! A multiplexer is driven by exactly one thread (the slot owning it) and does
//! no internal locking.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::actor::Liveness;
use crate::types::TimerKey;

/// Callback shared by every key of one multiplexer.
pub type TimerCallback<C> = fn(&mut C, &mut PendingTimers, TimerKey);

/// Object-safe view used by the scheduler to drive timers it does not know
/// the context type of.
pub trait TimerDriver {
    fn name(&self) -> &str;

    /// Smallest pending deadline, if any.
    fn next_deadline(&self) -> Option<Instant>;

    /// Fires everything due at `now`. Returns the number of callbacks invoked.
    fn run_once(&mut self, now: Instant) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    deadline: Instant,
    /// Insertion stamp; a pass only fires stamps older than its horizon.
    stamp: u64,
}

/// The pending entries of a multiplexer.
#[derive(Debug, Default)]
pub struct PendingTimers {
    by_deadline: BTreeSet<(Instant, TimerKey)>,
    by_key: HashMap<TimerKey, Scheduled>,
    next_stamp: u64,
}

impl PendingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `key` to fire `delay` seconds from now, replacing any pending
    /// deadline for the same key. Negative or NaN delays fire on the next pass;
    /// delays past what `Instant` can represent saturate to a far-future
    /// deadline.
    pub fn set_timeout_in(&mut self, key: TimerKey, delay: f64) {
        match deadline_after(Instant::now(), delay) {
            Some(deadline) => self.set_timeout_at(key, deadline),
            None => {
                trace!(key, delay, "delay not representable, timeout dropped");
                self.cancel_timeout(key);
            }
        }
    }

    pub fn set_timeout_at(&mut self, key: TimerKey, deadline: Instant) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        if let Some(previous) = self.by_key.insert(key, Scheduled { deadline, stamp }) {
            self.by_deadline.remove(&(previous.deadline, key));
        }
        self.by_deadline.insert((deadline, key));
    }

    /// Removes the entry for `key`. Returns whether one was pending.
    pub fn cancel_timeout(&mut self, key: TimerKey) -> bool {
        match self.by_key.remove(&key) {
            Some(scheduled) => {
                self.by_deadline.remove(&(scheduled.deadline, key));
                true
            }
            None => false,
        }
    }

    pub fn has_timeout(&self, key: TimerKey) -> bool {
        self.by_key.contains_key(&key)
    }

    pub fn deadline_of(&self, key: TimerKey) -> Option<Instant> {
        self.by_key.get(&key).map(|scheduled| scheduled.deadline)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.first().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_deadline.clear();
        self.by_key.clear();
    }

    /// Pending keys in firing order.
    pub fn keys(&self) -> Vec<TimerKey> {
        self.by_deadline.iter().map(|(_, key)| *key).collect()
    }

    fn horizon(&self) -> u64 {
        self.next_stamp
    }

    /// Keys due at `now`, in firing order.
    fn due_keys(&self, now: Instant) -> Vec<TimerKey> {
        self.by_deadline
            .range(..=(now, TimerKey::MAX))
            .map(|(_, key)| *key)
            .collect()
    }

    /// Removes `key` if it is still the entry that was pending before `horizon`.
    fn take_unchanged(&mut self, key: TimerKey, horizon: u64) -> bool {
        match self.by_key.get(&key) {
            Some(scheduled) if scheduled.stamp < horizon => {
                let deadline = scheduled.deadline;
                self.by_key.remove(&key);
                self.by_deadline.remove(&(deadline, key));
                true
            }
            _ => false,
        }
    }
}

/// Longest delay honoured as is; anything beyond saturates to it.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 3600);

fn deadline_after(now: Instant, delay: f64) -> Option<Instant> {
    if delay.is_nan() || delay <= 0.0 {
        return Some(now);
    }
    let delay = Duration::try_from_secs_f64(delay).map_or(FAR_FUTURE, |delay| delay.min(FAR_FUTURE));
    now.checked_add(delay)
}

/// Per-owner keyed timer set sharing one callback and one context.
pub struct TimerMultiplexer<C> {
    name: String,
    pending: PendingTimers,
    callback: TimerCallback<C>,
    context: C,
    owner: Option<Liveness>,
}

impl<C> TimerMultiplexer<C> {
    pub fn new(name: impl Into<String>, callback: TimerCallback<C>, context: C) -> Self {
        Self {
            name: name.into(),
            pending: PendingTimers::new(),
            callback,
            context,
            owner: None,
        }
    }

    /// Fences the multiplexer with the liveness of the actor owning it.
    pub fn with_owner(mut self, owner: Liveness) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn pending(&self) -> &PendingTimers {
        &self.pending
    }

    fn owner_alive(&self) -> bool {
        self.owner.as_ref().is_none_or(Liveness::is_alive)
    }

    pub fn set_timeout_in(&mut self, key: TimerKey, delay: f64) {
        if self.owner_alive() {
            self.pending.set_timeout_in(key, delay);
        } else {
            trace!(timer = %self.name, key, "ignoring timeout on a stopped owner");
        }
    }

    pub fn set_timeout_at(&mut self, key: TimerKey, deadline: Instant) {
        if self.owner_alive() {
            self.pending.set_timeout_at(key, deadline);
        } else {
            trace!(timer = %self.name, key, "ignoring timeout on a stopped owner");
        }
    }

    pub fn cancel_timeout(&mut self, key: TimerKey) {
        self.pending.cancel_timeout(key);
    }

    pub fn has_timeout(&self, key: TimerKey) -> bool {
        self.pending.has_timeout(key)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn run_once(&mut self, now: Instant) -> usize {
        // Entries stamped at or after the horizon were (re)scheduled during
        // this pass and wait for the next one.
        let horizon = self.pending.horizon();
        let mut fired = 0;
        for key in self.pending.due_keys(now) {
            if !self.owner_alive() {
                break;
            }
            if !self.pending.take_unchanged(key, horizon) {
                continue;
            }
            trace!(timer = %self.name, key, "timeout fired");
            (self.callback)(&mut self.context, &mut self.pending, key);
            fired += 1;
        }
        if !self.owner_alive() && !self.pending.is_empty() {
            debug!(
                timer = %self.name,
                discarded = self.pending.len(),
                "owner stopped, discarding pending timeouts"
            );
            self.pending.clear();
        }
        fired
    }
}

impl<C> TimerDriver for TimerMultiplexer<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_deadline(&self) -> Option<Instant> {
        TimerMultiplexer::next_deadline(self)
    }

    fn run_once(&mut self, now: Instant) -> usize {
        TimerMultiplexer::run_once(self, now)
    }
}

impl<C> fmt::Debug for TimerMultiplexer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerMultiplexer")
            .field("name", &self.name)
            .field("pending", &self.pending.len())
            .field("owner", &self.owner)
            .finish()
    }
}
