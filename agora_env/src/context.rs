//! Per-turn context handed to an agent's decision logic.

use crate::rng::SimRng;
use crate::types::{Action, ActionId, AgentId, AgentMemory};

/// Everything an agent may look at during one turn.
///
/// Built fresh for every (tick, agent) pair and dropped when the turn
/// ends. The RNG is derived from the run's root stream with
/// `derive(tick, agent_id)`, so an agent's draws never depend on what
/// other agents did.
pub struct TickContext<'a, V> {
    /// Tick index (0-based)
    pub tick: u64,

    /// Virtual time in seconds (`tick * seconds_per_tick`)
    pub timestamp: u64,

    /// The agent whose turn this is
    pub agent_id: &'a AgentId,

    /// Read-only world snapshot
    pub world: &'a V,

    /// Per-turn deterministic stream
    pub rng: SimRng,

    /// The agent's private memory, persisted across ticks
    pub memory: &'a mut AgentMemory,

    agent_ordinal: u32,
    next_seq: u32,
}

impl<'a, V> TickContext<'a, V> {
    /// Creates a context for one agent turn.
    pub fn new(
        tick: u64,
        timestamp: u64,
        agent_id: &'a AgentId,
        agent_ordinal: u32,
        world: &'a V,
        rng: SimRng,
        memory: &'a mut AgentMemory,
    ) -> Self {
        Self {
            tick,
            timestamp,
            agent_id,
            world,
            rng,
            memory,
            agent_ordinal,
            next_seq: 0,
        }
    }

    /// Starts a new action with a deterministic id.
    pub fn action(&mut self, name: &str) -> Action {
        let id = ActionId::from_parts(self.tick, self.agent_ordinal, self.next_seq);
        self.next_seq += 1;
        Action::new(id, name)
    }
}
