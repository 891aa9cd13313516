//! Agora Core - Deterministic Substrate for Agent Simulations
//!
//! Everything that decides whether two runs are the same lives here:
//! 1. **Gating**: declarative `Precondition` trees evaluated before apply
//! 2. **Ordering**: `Scheduler` turns a seed and tick into an agent order
//! 3. **Evidence**: action log records, metric sampling and canonical
//!    content hashes over the artifacts a run leaves behind
//! 4. **Diffing**: `Comparator` explains how two runs differ

pub mod agent;
pub mod artifacts;
pub mod assertion;
pub mod compare;
pub mod hash;
pub mod metrics;
pub mod precondition;
pub mod record;
pub mod scheduler;

// Re-export key types for convenience
pub use agent::Agent;
pub use artifacts::{ArtifactError, ArtifactSet, RunStatus, RunSummary};
pub use assertion::{evaluate_assertions, Assertion, AssertionFailure};
pub use compare::{
    format_percent, Comparator, Comparison, PercentChange, Verdict, DEFAULT_THRESHOLD,
};
pub use hash::{digest, ContentHashes};
pub use metrics::{MetricsCollector, MetricsConfig, MetricsSample};
pub use precondition::{CompareOp, Precondition, PreconditionEnv, PreconditionResult};
pub use record::{AgentStats, Outcome, RecordedAction};
pub use scheduler::{ScheduleError, ScheduleSlot, ScheduleStrategy, Scheduler};
