use std::fmt;

use starling_api::{ActorKey, Lifecycle};

use crate::actor::Actor;
use crate::context::Context;

/// A deferred invocation, type-erased over the target actor.
pub(crate) type Job = Box<dyn for<'c> FnOnce(&mut Box<dyn Actor>, &mut Context<'c>) + Send>;

pub(crate) fn job<F>(f: F) -> Job
where
    F: for<'c> FnOnce(&mut Box<dyn Actor>, &mut Context<'c>) + Send + 'static,
{
    Box::new(f)
}

/// What travels over a slot's inbound channel.
pub(crate) enum Envelope {
    /// Install a freshly registered actor on the receiving slot.
    Spawn {
        key: ActorKey,
        name: String,
        lifecycle: Lifecycle,
        actor: Box<dyn Actor>,
    },
    /// Run a closure against an actor of the receiving slot.
    Closure { key: ActorKey, job: Job },
    /// The actor's owner was reset.
    TearDown { key: ActorKey },
    /// Worker shutdown, sent by `Scheduler::finish`.
    Stop,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Spawn { key, name, .. } => f
                .debug_struct("Spawn")
                .field("key", key)
                .field("name", name)
                .finish(),
            Envelope::Closure { key, .. } => f
                .debug_struct("Closure")
                .field("key", key)
                .field("job", &"<closure>")
                .finish(),
            Envelope::TearDown { key } => f.debug_struct("TearDown").field("key", key).finish(),
            Envelope::Stop => f.write_str("Stop"),
        }
    }
}

/// An item waiting in an actor's private mailbox.
pub(crate) enum MailItem {
    StartUp,
    Closure(Job),
    TearDown,
}

impl fmt::Debug for MailItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailItem::StartUp => f.write_str("StartUp"),
            MailItem::Closure(_) => f.write_str("Closure(<closure>)"),
            MailItem::TearDown => f.write_str("TearDown"),
        }
    }
}
