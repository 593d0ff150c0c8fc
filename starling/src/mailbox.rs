use std::collections::VecDeque;

use starling_api::ActorKey;

use crate::envelope::MailItem;

/// An actor's private FIFO of pending items.
///
/// Only the thread owning the actor's slot touches it, so there is no
/// synchronization here; cross-thread delivery happens on the slot channel.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    items: VecDeque<MailItem>,
    /// Whether the owning actor currently sits in its slot's ready queue.
    scheduled: bool,
}

impl Mailbox {
    pub(crate) fn push(&mut self, item: MailItem) {
        self.items.push_back(item);
    }

    pub(crate) fn pop(&mut self) -> Option<MailItem> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Marks the mailbox as queued. Returns `true` if it was not queued yet.
    pub(crate) fn mark_scheduled(&mut self) -> bool {
        !std::mem::replace(&mut self.scheduled, true)
    }

    pub(crate) fn clear_scheduled(&mut self) {
        self.scheduled = false;
    }
}

/// Actors of one slot that have mailbox items waiting.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    queue: VecDeque<ActorKey>,
}

impl ReadyQueue {
    pub(crate) fn push_back(&mut self, key: ActorKey) {
        self.queue.push_back(key);
    }

    /// Re-queues an actor interrupted by a yield so it keeps its turn.
    pub(crate) fn push_front(&mut self, key: ActorKey) {
        self.queue.push_front(key);
    }

    pub(crate) fn pop(&mut self) -> Option<ActorKey> {
        self.queue.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_is_fifo() {
        let mut mailbox = Mailbox::default();
        mailbox.push(MailItem::StartUp);
        mailbox.push(MailItem::TearDown);
        assert_eq!(mailbox.len(), 2);
        assert!(matches!(mailbox.pop(), Some(MailItem::StartUp)));
        assert!(matches!(mailbox.pop(), Some(MailItem::TearDown)));
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_mark_scheduled_only_once() {
        let mut mailbox = Mailbox::default();
        assert!(mailbox.mark_scheduled());
        assert!(!mailbox.mark_scheduled());
        mailbox.clear_scheduled();
        assert!(mailbox.mark_scheduled());
    }

    #[test]
    fn test_ready_queue_push_front_keeps_turn() {
        let mut ready = ReadyQueue::default();
        ready.push_back(ActorKey::new(1, 0));
        ready.push_back(ActorKey::new(2, 0));
        let first = ready.pop().unwrap();
        ready.push_front(first);
        assert_eq!(ready.len(), 2);
        assert_eq!(ready.pop(), Some(ActorKey::new(1, 0)));
    }
}
