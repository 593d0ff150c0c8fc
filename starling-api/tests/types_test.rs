use std::time::{Duration, Instant};

use starling_api::{ActorKey, ActorState, Lifecycle, PendingTimers, SlotId};

#[test]
fn test_slot_id_numbering_and_display() {
    assert!(SlotId::MAIN.is_main());
    assert_eq!(SlotId::MAIN.index(), 0);
    assert_eq!(SlotId::worker(0).index(), 1);
    assert_eq!(SlotId::worker(0), SlotId::new(1));
    assert_eq!(SlotId::MAIN.to_string(), "main");
    assert_eq!(SlotId::worker(2).to_string(), "worker-2");
}

#[test]
fn test_actor_key_display() {
    assert_eq!(ActorKey::new(3, 0).to_string(), "3v0");
    assert_ne!(ActorKey::new(3, 0), ActorKey::new(3, 1));
}

#[test]
fn test_actor_state_display() {
    assert_eq!(ActorState::Alive.to_string(), "alive");
    assert_eq!(ActorState::Stopped.to_string(), "stopped");
}

#[test]
fn test_liveness_follows_lifecycle() {
    let lifecycle = Lifecycle::new();
    let liveness = lifecycle.watch();
    assert!(liveness.is_alive());

    assert!(lifecycle.begin_stopping());
    assert_eq!(liveness.state(), ActorState::Stopping);
    assert!(!liveness.is_stopped());

    lifecycle.mark_stopped();
    assert!(liveness.is_stopped());
}

#[test]
fn test_pending_timers_ordering_queries() {
    let base = Instant::now();
    let mut pending = PendingTimers::new();
    pending.set_timeout_at(5, base + Duration::from_millis(30));
    pending.set_timeout_at(8, base + Duration::from_millis(10));
    pending.set_timeout_at(1, base + Duration::from_millis(30));

    assert_eq!(pending.keys(), vec![8, 1, 5]);
    assert_eq!(pending.next_deadline(), Some(base + Duration::from_millis(10)));
    assert_eq!(pending.deadline_of(5), Some(base + Duration::from_millis(30)));

    assert!(pending.cancel_timeout(8));
    assert!(!pending.cancel_timeout(8));
    assert_eq!(pending.keys(), vec![1, 5]);

    pending.clear();
    assert!(pending.is_empty());
    assert_eq!(pending.deadline_of(5), None);
}
