// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::{Clock, FakeClock, TaskId};

#[test]
fn scheduler_timer_lifecycle() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();
    let task = TaskId::new();

    scheduler.set_timer(TimerId::grace(&task), Duration::from_secs(10), clock.now());
    assert!(scheduler.has_timers());
    assert!(scheduler.next_deadline().is_some());

    // Timer hasn't fired yet
    clock.advance(Duration::from_secs(5));
    let events = scheduler.fired_timers(clock.now());
    assert!(events.is_empty());
    assert!(scheduler.has_timers());

    // Timer fires
    clock.advance(Duration::from_secs(10));
    let events = scheduler.fired_timers(clock.now());
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::TimerFired { id } if *id == TimerId::grace(&task)));
    assert!(!scheduler.has_timers());
}

#[test]
fn scheduler_cancel_timer() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();
    let task = TaskId::new();

    scheduler.set_timer(TimerId::grace(&task), Duration::from_secs(10), clock.now());
    scheduler.cancel_timer(&TimerId::grace(&task));

    clock.advance(Duration::from_secs(15));
    assert!(scheduler.fired_timers(clock.now()).is_empty());
}

#[test]
fn scheduler_rearm_replaces_deadline() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::hitl_sweep(), Duration::from_secs(5), clock.now());
    scheduler.set_timer(TimerId::hitl_sweep(), Duration::from_secs(30), clock.now());

    clock.advance(Duration::from_secs(10));
    assert!(scheduler.fired_timers(clock.now()).is_empty());

    clock.advance(Duration::from_secs(25));
    assert_eq!(scheduler.fired_timers(clock.now()).len(), 1);
}

#[test]
fn fired_timers_are_ordered_by_id() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::stall_scan(), Duration::from_secs(1), clock.now());
    scheduler.set_timer(TimerId::hitl_sweep(), Duration::from_secs(1), clock.now());

    clock.advance(Duration::from_secs(2));
    let events = scheduler.fired_timers(clock.now());
    let ids: Vec<String> = events
        .iter()
        .map(|e| match e {
            Event::TimerFired { id } => id.to_string(),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(ids, vec!["sweep:hitl".to_string(), "sweep:stall".to_string()]);
}
