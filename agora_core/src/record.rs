//! Action log entries and per-agent counters.

use agora_env::{Action, ActionResult, AgentId, FailureKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happened to one agent turn that produced a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Preconditions passed and the pack applied (or reverted) the action
    Applied(ActionResult),

    /// A precondition failed; the pack was never called
    Rejected { reason: String },

    /// The agent's decision logic failed
    AgentError { reason: String },
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Outcome::Applied(result) if result.success)
    }

    /// Failure classification, `None` on success.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Applied(result) if result.success => None,
            Outcome::Applied(result) => Some(result.kind.unwrap_or(FailureKind::Internal)),
            Outcome::Rejected { .. } => Some(FailureKind::Precondition),
            Outcome::AgentError { .. } => Some(FailureKind::AgentInternal),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Applied(result) => result.revert_reason(),
            Outcome::Rejected { reason } | Outcome::AgentError { reason } => Some(reason),
        }
    }
}

/// One append-only entry of the action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub tick: u64,
    pub timestamp: u64,
    pub agent_id: AgentId,
    pub agent_type: String,

    /// Absent when the agent failed before proposing anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    pub outcome: Outcome,

    /// Wall-clock time spent in the pack. Never serialized: it varies
    /// between hosts and would break byte-identical logs.
    #[serde(skip)]
    pub duration: Duration,
}

impl RecordedAction {
    pub fn action_name(&self) -> Option<&str> {
        self.action.as_ref().map(|a| a.name.as_str())
    }
}

/// Per-agent counters. `attempted == succeeded + failed + rejected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub agent_type: String,
    pub actions_attempted: u64,
    pub actions_succeeded: u64,
    pub actions_failed: u64,
    pub actions_rejected: u64,
}

impl AgentStats {
    pub fn new(agent_type: &str) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            ..Default::default()
        }
    }

    /// Counts one recorded outcome.
    pub fn record(&mut self, outcome: &Outcome) {
        self.actions_attempted += 1;
        match outcome {
            Outcome::Applied(result) if result.success => self.actions_succeeded += 1,
            Outcome::Applied(_) | Outcome::AgentError { .. } => self.actions_failed += 1,
            Outcome::Rejected { .. } => self.actions_rejected += 1,
        }
    }

    /// Folds another agent's counters into this one.
    pub fn absorb(&mut self, other: &AgentStats) {
        self.actions_attempted += other.actions_attempted;
        self.actions_succeeded += other.actions_succeeded;
        self.actions_failed += other.actions_failed;
        self.actions_rejected += other.actions_rejected;
    }
}
