// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-in-the-loop gate: decides what happens before a task may work.
//!
//! The decision function is pure — it reads the emergency-stop flag, the
//! phase policy, the step's declared gates, and the auto-approval
//! counter, in that order, and says what the runtime must do. All
//! mutation (counter decrement, approval creation) stays with the caller.

use serde::{Deserialize, Serialize};
use sw_core::{AgentKind, ApprovalKind, HitlCounter, Phase};

/// One phase-policy rule: a (phase, agent) pair that is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub phase: Phase,
    pub agent: AgentKind,
}

/// Declarative pre-execution policy.
///
/// `deny` pairs are hard denials (policy_violation approvals);
/// `deny_markers` are instruction substrings that hard-deny;
/// `review_markers` are substrings that merely force a human review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePolicy {
    #[serde(default)]
    pub deny: Vec<PolicyRule>,
    #[serde(default)]
    pub deny_markers: Vec<String>,
    #[serde(default)]
    pub review_markers: Vec<String>,
}

/// Outcome of the policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    Allow,
    /// Hard deny; names the rule for the `policy.violation` event
    Deny(String),
    /// Soft flag; forces a pre-execution review
    Review(String),
}

impl PhasePolicy {
    /// Check a (phase, agent, instructions) triple. Denials win over
    /// review flags.
    pub fn check(&self, phase: Phase, agent: AgentKind, instructions: &str) -> PolicyVerdict {
        if self.deny.iter().any(|r| r.phase == phase && r.agent == agent) {
            return PolicyVerdict::Deny(format!("phase_policy:{phase}:{agent}"));
        }
        for marker in &self.deny_markers {
            if instructions.contains(marker.as_str()) {
                return PolicyVerdict::Deny(format!("deny_marker:{marker}"));
            }
        }
        for marker in &self.review_markers {
            if instructions.contains(marker.as_str()) {
                return PolicyVerdict::Review(format!("review_marker:{marker}"));
            }
        }
        PolicyVerdict::Allow
    }
}

/// What the gate decided for a task about to enter `working`.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Proceed. `decremented` carries the counter's new remaining value
    /// when an auto-approval consumed budget (the caller emits
    /// `counter.decremented` and applies the new value).
    AutoApprove { decremented: Option<u32> },
    /// Park the task behind an approval of this kind.
    NeedsApproval { kind: ApprovalKind, reason: String },
    /// Emergency stop covers the project; no approval is created.
    Halt { reason: String },
}

/// Everything the decision function looks at for one task.
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub phase: Phase,
    pub agent: AgentKind,
    pub instructions: &'a str,
    /// Approval kind the step itself demands (phase gate or declared
    /// pre-execution review), if any
    pub step_approval: Option<ApprovalKind>,
    /// An active emergency stop covers the project
    pub stop_active: bool,
    pub counter: HitlCounter,
}

/// The HITL gate: policy plus the fixed decision order.
#[derive(Debug, Clone, Default)]
pub struct HitlGate {
    policy: PhasePolicy,
}

impl HitlGate {
    pub fn new(policy: PhasePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PhasePolicy {
        &self.policy
    }

    /// The decision order, top to bottom:
    /// 1. emergency stop → halt
    /// 2. policy deny → policy_violation approval
    /// 3. step-declared gate / policy review → approval of that kind
    /// 4. counter enabled, exhausted → counter_expiry approval
    /// 5. counter enabled, budget left → decrement, silent auto-approve
    /// 6. counter disabled → silent auto-approve
    pub fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        if input.stop_active {
            return GateDecision::Halt { reason: "emergency_stop".to_string() };
        }

        let verdict = self.policy.check(input.phase, input.agent, input.instructions);
        if let PolicyVerdict::Deny(rule) = verdict {
            return GateDecision::NeedsApproval {
                kind: ApprovalKind::PolicyViolation,
                reason: rule,
            };
        }

        if let Some(kind) = input.step_approval {
            return GateDecision::NeedsApproval { kind, reason: "step_gate".to_string() };
        }
        if let PolicyVerdict::Review(rule) = verdict {
            return GateDecision::NeedsApproval { kind: ApprovalKind::PreExecution, reason: rule };
        }

        if input.counter.enabled {
            if input.counter.remaining == 0 {
                return GateDecision::NeedsApproval {
                    kind: ApprovalKind::CounterExpiry,
                    reason: "auto-approval budget exhausted".to_string(),
                };
            }
            return GateDecision::AutoApprove {
                decremented: Some(input.counter.remaining - 1),
            };
        }

        GateDecision::AutoApprove { decremented: None }
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
