//! Per-tick agent ordering.
//!
//! Ordering depends only on the roster, the strategy and a stream derived
//! from the root RNG with `derive(tick, None)`. The scheduler never sees
//! world state.

use agora_env::SimRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How agent turns are ordered within a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStrategy {
    /// Roster order, no randomness
    #[default]
    Sequential,
    /// Fisher–Yates over the enabled roster
    Shuffled,
    /// Weighted sampling without replacement
    Weighted,
}

impl std::str::FromStr for ScheduleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ScheduleStrategy::Sequential),
            "shuffled" | "shuffle" => Ok(ScheduleStrategy::Shuffled),
            "weighted" => Ok(ScheduleStrategy::Weighted),
            _ => Err(format!("Unknown schedule strategy: {}", s)),
        }
    }
}

/// Scheduling attributes of one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleSlot {
    /// Relative weight for `Weighted`
    pub weight: f64,
    /// Disabled agents are never scheduled
    pub enabled: bool,
}

impl Default for ScheduleSlot {
    fn default() -> Self {
        Self {
            weight: 1.0,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("Agent slot {slot} has non-positive weight {weight}")]
    NonPositiveWeight { slot: usize, weight: f64 },
}

/// Computes the ordered agent sequence for each tick.
#[derive(Debug, Clone)]
pub struct Scheduler {
    strategy: ScheduleStrategy,
    slots: Vec<ScheduleSlot>,
    enabled: Vec<usize>,
}

impl Scheduler {
    /// Creates a scheduler over `slots` (indexed like the agent roster).
    pub fn new(
        strategy: ScheduleStrategy,
        slots: Vec<ScheduleSlot>,
    ) -> Result<Self, ScheduleError> {
        if strategy == ScheduleStrategy::Weighted {
            for (slot, s) in slots.iter().enumerate() {
                if s.enabled && !(s.weight.is_finite() && s.weight > 0.0) {
                    return Err(ScheduleError::NonPositiveWeight { slot, weight: s.weight });
                }
            }
        }
        let enabled = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.enabled)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            strategy,
            slots,
            enabled,
        })
    }

    pub fn strategy(&self) -> ScheduleStrategy {
        self.strategy
    }

    /// Number of agents scheduled every tick.
    pub fn enabled_count(&self) -> usize {
        self.enabled.len()
    }

    /// Returns slot indices in turn order for `tick`.
    pub fn order(&self, root: &SimRng, tick: u64) -> Vec<usize> {
        match self.strategy {
            ScheduleStrategy::Sequential => self.enabled.clone(),
            ScheduleStrategy::Shuffled => {
                let mut rng = root.derive(tick, None);
                let mut order = self.enabled.clone();
                rng.shuffle(&mut order);
                order
            }
            ScheduleStrategy::Weighted => {
                let mut rng = root.derive(tick, None);
                let mut remaining = self.enabled.clone();
                let mut order = Vec::with_capacity(remaining.len());
                while !remaining.is_empty() {
                    let weights: Vec<f64> =
                        remaining.iter().map(|&i| self.slots[i].weight).collect();
                    match rng.weighted_index(&weights) {
                        Ok(pick) => order.push(remaining.remove(pick)),
                        // Weights are validated in `new`, so this is unreachable
                        Err(_) => order.append(&mut remaining),
                    }
                }
                order
            }
        }
    }
}
