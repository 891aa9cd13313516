//! Pack capability: the world model a simulation runs against.

use serde_json::Value;

use crate::error::SetupError;
use crate::types::{Action, ActionResult, AgentId};

/// Read-only queries agents and preconditions make against a world snapshot.
///
/// Every method returns `None` when the world has no such entry, so gates
/// can fail with a reason instead of erroring.
pub trait StateView {
    /// Balance of `asset` held by `account`.
    fn balance(&self, account: &str, asset: &str) -> Option<f64>;

    /// Amount of `asset` that `owner` has approved `spender` to move.
    fn allowance(&self, owner: &str, spender: &str, asset: &str) -> Option<f64>;

    /// Any named scalar the world exposes (price, reserves, ...).
    fn value(&self, key: &str) -> Option<f64>;
}

/// Anything metrics can be sampled from.
pub trait MetricSource {
    /// Current value of metric `key`, `None` if unknown.
    fn metric(&self, key: &str) -> Option<f64>;
}

/// Inputs a pack receives when building its initial world.
#[derive(Debug, Clone, Copy)]
pub struct PackSetup<'a> {
    /// Scenario-supplied pack parameters
    pub params: &'a Value,

    /// Virtual seconds per tick
    pub seconds_per_tick: u64,

    /// Every agent in the run, in roster order
    pub agents: &'a [AgentId],
}

/// Per-call context for `Pack::apply`.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub tick: u64,
    pub timestamp: u64,
    pub agent: &'a AgentId,
}

/// The world model capability set: build, mutate atomically, observe.
///
/// # Contract
///
/// - `apply` is all-or-nothing: when the returned result is not a
///   success, the world must be exactly as it was before the call.
/// - `apply`, `snapshot` and `metric` must be pure functions of the world
///   state and their arguments (no clocks, no OS entropy).
pub trait Pack: Send {
    /// Read-only view handed to agents and preconditions.
    type View: StateView + Clone + Send;

    /// Short name recorded in artifacts.
    fn name(&self) -> &str;

    /// Builds the initial world. Failure is fatal for the run.
    fn initialize(&mut self, setup: &PackSetup<'_>) -> Result<(), SetupError>;

    /// Moves the world clock to `tick`. Called once per tick before any
    /// agent acts, including ticks in which nobody acts.
    fn advance(&mut self, _tick: u64, _timestamp: u64) {}

    /// Applies one action on behalf of `ctx.agent`.
    fn apply(&mut self, ctx: &ApplyContext<'_>, action: &Action) -> ActionResult;

    /// Snapshot of the current world.
    fn snapshot(&self) -> Self::View;

    /// Current value of a world metric.
    fn metric(&self, key: &str) -> Option<f64>;
}
