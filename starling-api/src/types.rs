use std::fmt;

/// Key of a timer entry inside a timer multiplexer.
pub type TimerKey = i64;

/// Identity of a thread slot.
///
/// Slot 0 always belongs to the cooperative main thread, slots `1..=N` to the
/// worker threads of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    /// The slot driven by `run_main` on the host thread.
    pub const MAIN: SlotId = SlotId(0);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Slot of the `n`-th worker thread (zero based).
    pub const fn worker(n: usize) -> Self {
        Self(n + 1)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn is_main(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "worker-{}", self.0 - 1)
        }
    }
}

/// Registry identity of an actor.
///
/// The index may be reused once the actor is stopped; the generation is bumped
/// on every reuse so stale keys never resolve to a newer actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorKey {
    /// Slot number in the registry
    pub index: u32,
    /// Generation number to prevent use-after-free
    pub generation: u32,
}

impl ActorKey {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}
