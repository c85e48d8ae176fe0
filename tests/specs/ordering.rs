// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordering and delivery specs: the audit trail is totally ordered per
//! project, replay is a suffix, and subscribers see publication order.

use super::prelude::*;
use sw_engine::FabricMessage;

#[tokio::test(start_paused = true)]
async fn events_are_totally_ordered_within_a_project() {
    let mut daemon = TestDaemon::new();
    let p1 = daemon.create_project("One");
    let p2 = daemon.create_project("Two");

    daemon.submit_task(&p1, AgentKind::Analyst);
    daemon.submit_task(&p2, AgentKind::Coder);
    daemon.pump().await;

    let state = daemon.state.lock();
    for project in [p1.id, p2.id] {
        let ordered: Vec<(u64, u64)> = state
            .audit
            .iter()
            .filter(|r| r.project_id == Some(project))
            .map(|r| (r.timestamp_ms, r.seq))
            .collect();
        let mut sorted = ordered.clone();
        sorted.sort_unstable();
        assert_eq!(ordered, sorted, "audit out of order for {project}");
    }
}

#[tokio::test(start_paused = true)]
async fn task_lifecycle_events_are_causally_ordered() {
    let mut daemon = TestDaemon::new();
    let project = daemon.create_project("One");
    let task_id = daemon.submit_task(&project, AgentKind::Analyst);
    daemon.pump().await;

    let positions: Vec<&'static str> = daemon
        .state
        .lock()
        .audit
        .iter()
        .filter(|r| r.event.task_id() == Some(task_id))
        .map(|r| r.kind())
        .collect();
    let created = positions.iter().position(|k| *k == "task.created").unwrap();
    let started = positions.iter().position(|k| *k == "task.started").unwrap();
    let completed = positions.iter().position(|k| *k == "task.completed").unwrap();
    assert!(created < started && started < completed, "{positions:?}");
}

#[tokio::test(start_paused = true)]
async fn replay_from_any_cursor_is_a_suffix() {
    let mut daemon = TestDaemon::new();
    let project = daemon.create_project("One");
    daemon.submit_task(&project, AgentKind::Analyst);
    daemon.pump().await;

    let full: Vec<u64> = daemon
        .fabric
        .replay(Some(project.id), 0)
        .iter()
        .map(|r| r.seq)
        .collect();
    assert!(full.len() >= 4);

    for cursor in &full {
        let suffix: Vec<u64> = daemon
            .fabric
            .replay(Some(project.id), *cursor)
            .iter()
            .map(|r| r.seq)
            .collect();
        let expected: Vec<u64> = full.iter().copied().filter(|s| s > cursor).collect();
        assert_eq!(suffix, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_project_scoped_publication_order() {
    let mut daemon = TestDaemon::new();
    let p1 = daemon.create_project("One");
    let mut sub = daemon.fabric.subscribe(SubscribeScope::Project(p1.id));
    let p2 = daemon.create_project("Two");

    daemon.submit_task(&p1, AgentKind::Analyst);
    daemon.submit_task(&p2, AgentKind::Coder);
    daemon.pump().await;

    let mut seen: Vec<u64> = Vec::new();
    while let Ok(Some(FabricMessage::Event(record))) =
        tokio::time::timeout(Duration::from_millis(100), sub.recv()).await
    {
        assert_eq!(record.project_id, Some(p1.id), "leaked cross-project event");
        seen.push(record.seq);
    }
    let mut sorted = seen.clone();
    sorted.sort_unstable();
    assert_eq!(seen, sorted);
    assert!(!seen.is_empty());
}
