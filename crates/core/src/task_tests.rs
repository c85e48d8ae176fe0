// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn terminal_statuses() {
    assert!(!TaskStatus::Pending.is_terminal());
    assert!(!TaskStatus::Working.is_terminal());
    assert!(!TaskStatus::WaitingForHitl.is_terminal());
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
}

#[yare::parameterized(
    start             = { TaskStatus::Pending, TaskStatus::Working },
    gate_before_start = { TaskStatus::Pending, TaskStatus::WaitingForHitl },
    cancel_pending    = { TaskStatus::Pending, TaskStatus::Cancelled },
    complete          = { TaskStatus::Working, TaskStatus::Completed },
    fail              = { TaskStatus::Working, TaskStatus::Failed },
    cancel_working    = { TaskStatus::Working, TaskStatus::Cancelled },
    suspend           = { TaskStatus::Working, TaskStatus::WaitingForHitl },
    resume            = { TaskStatus::WaitingForHitl, TaskStatus::Working },
    requeue           = { TaskStatus::WaitingForHitl, TaskStatus::Pending },
    reject            = { TaskStatus::WaitingForHitl, TaskStatus::Cancelled },
    expire            = { TaskStatus::WaitingForHitl, TaskStatus::Failed },
)]
fn legal_transitions(from: TaskStatus, to: TaskStatus) {
    assert!(from.can_transition_to(to), "{from} -> {to} should be legal");
}

#[yare::parameterized(
    skip_working     = { TaskStatus::Pending, TaskStatus::Completed },
    fail_from_pending = { TaskStatus::Pending, TaskStatus::Failed },
    resurrect        = { TaskStatus::Completed, TaskStatus::Working },
    unfail           = { TaskStatus::Failed, TaskStatus::Pending },
    uncancel         = { TaskStatus::Cancelled, TaskStatus::Working },
    complete_waiting = { TaskStatus::WaitingForHitl, TaskStatus::Completed },
)]
fn illegal_transitions(from: TaskStatus, to: TaskStatus) {
    assert!(!from.can_transition_to(to), "{from} -> {to} should be illegal");
}

#[test]
fn builder_produces_pending_task() {
    let task = Task::builder().agent(AgentKind::Coder).instructions("write it").build();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.agent, AgentKind::Coder);
    assert_eq!(task.instructions, "write it");
    assert!(task.id.as_str().starts_with("tsk-"));
    assert!(!task.is_terminal());
}

#[cfg(test)]
mod status_paths {
    use super::*;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Working),
            Just(TaskStatus::WaitingForHitl),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Failed),
            Just(TaskStatus::Cancelled),
        ]
    }

    proptest! {
        /// No legal edge ever leaves a terminal state.
        #[test]
        fn terminal_states_are_absorbing(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }

        /// Any chain of legal edges starting at Pending stays within the
        /// documented state machine and stops once it hits a terminal state.
        #[test]
        fn random_walks_respect_the_machine(choices in proptest::collection::vec(0usize..4, 0..8)) {
            let mut current = TaskStatus::Pending;
            for c in choices {
                let nexts: Vec<TaskStatus> = [
                    TaskStatus::Pending,
                    TaskStatus::Working,
                    TaskStatus::WaitingForHitl,
                    TaskStatus::Completed,
                    TaskStatus::Failed,
                    TaskStatus::Cancelled,
                ]
                .into_iter()
                .filter(|n| current.can_transition_to(*n))
                .collect();
                if nexts.is_empty() {
                    prop_assert!(current.is_terminal());
                    break;
                }
                current = nexts[c % nexts.len()];
            }
        }
    }
}
