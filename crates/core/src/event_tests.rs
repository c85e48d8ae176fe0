// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::TaskStatus;

fn sample_task() -> Task {
    Task::builder().build()
}

#[test]
fn events_serialize_with_dotted_type_tag() {
    let task = sample_task();
    let event = Event::TaskStarted { id: task.id, project_id: task.project_id, attempt: 1 };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task.started");
    assert_eq!(json["attempt"], 1);
}

#[test]
fn unknown_type_tag_deserializes_to_custom() {
    let event: Event =
        serde_json::from_str(r#"{"type": "galaxy.exploded", "magnitude": 9}"#).unwrap();
    assert_eq!(event, Event::Custom);
}

#[test]
fn kind_matches_serialized_tag() {
    let task = sample_task();
    let events = vec![
        Event::TaskCreated { task: task.clone() },
        Event::TaskFailed {
            id: task.id,
            project_id: task.project_id,
            error: "boom".to_string(),
        },
        Event::CounterExhausted { project_id: task.project_id },
        Event::Shutdown,
    ];
    for event in events {
        if event.is_control() {
            continue;
        }
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
    }
}

#[test]
fn project_scope_is_derived() {
    let task = sample_task();
    let scoped = Event::TaskCreated { task: task.clone() };
    assert_eq!(scoped.project_id(), Some(task.project_id));

    let global_stop = Event::EmergencyStopActivated {
        stop: EmergencyStop {
            id: StopId::new(),
            scope: StopScope::Global,
            active: true,
            reason: "drill".to_string(),
            created_at_ms: 0,
            deactivated_at_ms: None,
        },
    };
    assert_eq!(global_stop.project_id(), None);

    let project_stop = Event::EmergencyStopActivated {
        stop: EmergencyStop {
            id: StopId::new(),
            scope: StopScope::Project(task.project_id),
            active: true,
            reason: "drill".to_string(),
            created_at_ms: 0,
            deactivated_at_ms: None,
        },
    };
    assert_eq!(project_stop.project_id(), Some(task.project_id));
}

#[test]
fn task_id_is_extracted_from_task_events() {
    let task = sample_task();
    assert_eq!(Event::TaskCreated { task: task.clone() }.task_id(), Some(task.id));
    assert_eq!(
        Event::TaskStarted { id: task.id, project_id: task.project_id, attempt: 1 }.task_id(),
        Some(task.id)
    );
    assert_eq!(Event::Shutdown.task_id(), None);
}

#[test]
fn control_events_are_flagged() {
    assert!(Event::TimerFired { id: TimerId::hitl_sweep() }.is_control());
    assert!(Event::Shutdown.is_control());
    assert!(!Event::CounterExhausted { project_id: ProjectId::new() }.is_control());
}

#[test]
fn record_roundtrips_through_serde() {
    let mut task = sample_task();
    task.status = TaskStatus::Pending;
    let record = EventRecord::new(7, 1_000, Event::TaskCreated { task: task.clone() });
    assert_eq!(record.project_id, Some(task.project_id));
    assert_eq!(record.kind(), "task.created");

    let json = serde_json::to_string(&record).unwrap();
    let back: EventRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
    assert_eq!(back.seq, 7);
}

#[test]
fn log_summary_names_the_subject() {
    let task = sample_task();
    let summary = Event::TaskCreated { task: task.clone() }.log_summary();
    assert!(summary.contains("task.created"));
    assert!(summary.contains(task.id.as_str()));
}
