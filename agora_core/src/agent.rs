//! Agent capability: the decision side of a simulation.

use agora_env::{Action, AgentError, AgentMemory, TickContext};

use crate::precondition::Precondition;
use crate::record::Outcome;

/// A decision-making participant.
///
/// Implementations may keep private state across ticks either in `self`
/// or in `ctx.memory`; the engine never shares either with other agents.
/// All randomness must come from `ctx.rng`.
pub trait Agent<V>: Send {
    /// Type tag (the roster entry's `type`).
    fn agent_type(&self) -> &str;

    /// Proposes zero or one action for this turn.
    ///
    /// `Ok(None)` means the agent declines to act. An `Err` is isolated to
    /// this turn and recorded as an agent-internal failure.
    fn decide(&mut self, ctx: &mut TickContext<'_, V>) -> Result<Option<Action>, AgentError>;

    /// Gates that must pass before `action` is applied.
    fn preconditions(&self, _action: &Action) -> Precondition {
        Precondition::Always
    }

    /// Called once the proposed action has an outcome, before the next
    /// agent's turn. `tick` is the tick the action was proposed in.
    fn observe(
        &mut self,
        _tick: u64,
        _action: &Action,
        _outcome: &Outcome,
        _memory: &mut AgentMemory,
    ) {
    }
}
