// Integration tests for the scheduler lifecycle


use std::time::Duration;

use starling::{Actor, Context, Scheduler, SchedulerConfig, SlotId, SpawnError, SystemError};
use test_helpers::*;

/// Reports which thread its hooks ran on.
struct Probe {
    events: flume::Sender<String>,
}

impl Actor for Probe {
    fn start_up(&mut self, ctx: &mut Context<'_>) {
        let thread = std::thread::current().name().unwrap_or("unnamed").to_string();
        let _ = self.events.send(format!("start_up {} {}", ctx.slot(), thread));
    }

    fn tear_down(&mut self, ctx: &mut Context<'_>) {
        let _ = self.events.send(format!("tear_down {}", ctx.slot()));
    }
}

#[test]
fn test_start_twice_is_rejected() -> anyhow::Result<()> {
    let mut scheduler = setup_scheduler(1)?;
    assert!(matches!(scheduler.start(), Err(SystemError::AlreadyStarted)));
    scheduler.finish()?;
    Ok(())
}

#[test]
fn test_finish_is_idempotent() -> anyhow::Result<()> {
    let mut scheduler = setup_scheduler(2)?;
    scheduler.finish()?;
    scheduler.finish()?;
    assert!(!scheduler.run_main(Duration::ZERO));
    assert!(matches!(scheduler.start(), Err(SystemError::ShuttingDown)));
    Ok(())
}

#[test]
fn test_run_main_reports_finish_request() -> anyhow::Result<()> {
    let mut scheduler = setup_scheduler(0)?;
    assert!(scheduler.run_main(Duration::ZERO));

    scheduler.handle().finish();
    assert!(scheduler.handle().is_finished());
    assert!(!scheduler.run_main(Duration::ZERO));

    scheduler.finish()?;
    Ok(())
}

#[test]
fn test_invalid_slot_is_rejected() -> anyhow::Result<()> {
    let (events, _rx) = flume::unbounded();
    let mut scheduler = setup_scheduler(1)?;

    let result = scheduler.create_actor_on(SlotId::worker(5), "probe", Probe { events });
    match result {
        Err(SpawnError::InvalidSlot { slot, slots }) => {
            assert_eq!(slot, SlotId::worker(5));
            assert_eq!(slots, 2);
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert_eq!(scheduler.handle().live_actor_count(), 0);

    scheduler.finish()?;
    Ok(())
}

#[test]
fn test_create_after_finish_is_rejected() -> anyhow::Result<()> {
    let (events, _rx) = flume::unbounded();
    let mut scheduler = setup_scheduler(1)?;
    scheduler.finish()?;

    assert!(matches!(
        scheduler.create_actor("probe", Probe { events }),
        Err(SpawnError::SystemShutdown)
    ));
    Ok(())
}

#[test]
fn test_round_robin_over_workers() -> anyhow::Result<()> {
    let (events, _rx) = flume::unbounded();
    let mut scheduler = setup_scheduler(2)?;

    let a = scheduler.create_actor("a", Probe { events: events.clone() })?;
    let b = scheduler.create_actor("b", Probe { events: events.clone() })?;
    let c = scheduler.create_actor("c", Probe { events })?;

    let slots: Vec<SlotId> = [&a, &b, &c]
        .iter()
        .filter_map(|own| own.id().map(|id| id.slot()))
        .collect();
    assert_eq!(slots, vec![SlotId::worker(0), SlotId::worker(1), SlotId::worker(0)]);
    assert_eq!(scheduler.handle().worker_count(), 2);
    assert_eq!(scheduler.handle().slot_count(), 3);

    scheduler.finish()?;
    Ok(())
}

#[test]
fn test_without_workers_actors_land_on_main() -> anyhow::Result<()> {
    let (events, rx) = flume::unbounded();
    let mut scheduler = setup_scheduler(0)?;

    let own = scheduler.create_actor("probe", Probe { events })?;
    assert_eq!(own.id().map(|id| id.slot()), Some(SlotId::MAIN));

    // Nothing runs on main until the host drives it.
    assert!(rx.try_recv().is_err());
    scheduler.run_main(Duration::ZERO);
    let event = rx.recv_timeout(DEFAULT_WAIT)?;
    assert!(event.starts_with("start_up main"));

    scheduler.finish()?;
    Ok(())
}

#[test]
fn test_worker_threads_are_named() -> anyhow::Result<()> {
    let (events, rx) = flume::unbounded();
    let mut scheduler = setup_scheduler(1)?;

    let _own = scheduler.create_actor_on(SlotId::worker(0), "probe", Probe { events })?;
    assert_eq!(rx.recv_timeout(DEFAULT_WAIT)?, "start_up worker-0 test-worker-0");

    scheduler.finish()?;
    Ok(())
}

#[test]
fn test_finish_tears_down_remaining_actors() -> anyhow::Result<()> {
    let (events, rx) = flume::unbounded();
    let mut scheduler = setup_scheduler(2)?;

    let owners = (0..4)
        .map(|n| scheduler.create_actor(format!("probe-{n}"), Probe { events: events.clone() }))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(scheduler.handle().live_actor_count(), 4);

    scheduler.finish()?;
    assert_eq!(scheduler.handle().live_actor_count(), 0);
    for own in &owners {
        assert!(own.id().is_some_and(|id| !id.is_alive()));
    }

    let tear_downs = rx.drain().filter(|event| event.starts_with("tear_down")).count();
    assert_eq!(tear_downs, 4);
    Ok(())
}

#[test]
fn test_finish_without_start_drains_on_host() -> anyhow::Result<()> {
    let (events, rx) = flume::unbounded();
    let mut scheduler = Scheduler::with_config(SchedulerConfig::default().with_worker_threads(1))?;

    let own = scheduler.create_actor_on(SlotId::worker(0), "probe", Probe { events })?;
    scheduler.finish()?;

    let events: Vec<String> = rx.drain().collect();
    assert_eq!(events.len(), 2);
    assert!(events[0].starts_with("start_up worker-0"));
    assert_eq!(events[1], "tear_down worker-0");
    assert!(own.id().is_some_and(|id| !id.is_alive()));
    Ok(())
}

#[test]
fn test_handle_debug_format() -> anyhow::Result<()> {
    let mut scheduler = setup_scheduler(1)?;
    let debug = format!("{:?}", scheduler.handle());
    assert!(debug.contains("slots: 2"));
    scheduler.finish()?;
    Ok(())
}
