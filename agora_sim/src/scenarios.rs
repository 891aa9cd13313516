//! Builtin market scenarios.

use agora_core::{Assertion, CompareOp, MetricsConfig, ScheduleStrategy};
use serde_json::json;

use crate::engine::ENGINE_METRICS;
use crate::scenario::{RosterEntry, Scenario};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Five agents trading in a calm market
    BaselineMarket,

    /// Larger weighted population with batch swaps that hit the step limit
    BusyMarket,

    /// Agents that error and panic next to healthy traders
    FaultyAgents,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::BaselineMarket,
            ScenarioId::BusyMarket,
            ScenarioId::FaultyAgents,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::BaselineMarket => "baseline_market",
            ScenarioId::BusyMarket => "busy_market",
            ScenarioId::FaultyAgents => "faulty_agents",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::BaselineMarket => {
                "3 random traders, 1 momentum trader, 1 liquidity hog; 50 ticks"
            }
            ScenarioId::BusyMarket => {
                "12 weighted agents, batch swaps over the step budget; 200 ticks"
            }
            ScenarioId::FaultyAgents => {
                "erroring and panicking agents beside healthy traders; 40 ticks"
            }
        }
    }

    /// Builds the scenario with the given seed.
    pub fn build(&self, seed: u64) -> Scenario {
        let mut scenario = match self {
            ScenarioId::BaselineMarket => Scenario::new(self.name(), seed, 50)
                .with_schedule(ScheduleStrategy::Shuffled)
                .with_agents(RosterEntry::new("random_trader", 3))
                .with_agents(RosterEntry::new("momentum_trader", 1))
                .with_agents(RosterEntry::new("liquidity_hog", 1))
                .with_assertion(Assertion::new("volume", CompareOp::Gt, 0.0))
                .with_assertion(Assertion::new("price", CompareOp::Gt, 0.0)),

            ScenarioId::BusyMarket => Scenario::new(self.name(), seed, 200)
                .with_schedule(ScheduleStrategy::Weighted)
                .with_agents(
                    RosterEntry::new("random_trader", 6)
                        .with_params(json!({
                            "act_probability": 0.8,
                            "mean_size": 40.0,
                            "size_std": 15.0
                        }))
                        .with_weight(2.0),
                )
                .with_agents(RosterEntry::new("momentum_trader", 3).with_weight(1.0))
                .with_agents(
                    RosterEntry::new("liquidity_hog", 1)
                        .with_params(json!({"amount": 5.0, "cooldown_ticks": 10, "batch_legs": 6}))
                        .with_weight(0.5),
                )
                .with_agents(RosterEntry::new("idle", 2).with_weight(0.25))
                .with_assertion(Assertion::new("swap_count", CompareOp::Gt, 0.0)),

            ScenarioId::FaultyAgents => Scenario::new(self.name(), seed, 40)
                .with_agents(RosterEntry::new("random_trader", 2))
                .with_agents(RosterEntry::new("faulty", 1))
                .with_agents(
                    RosterEntry::new("faulty", 1)
                        .with_params(json!({"fail_every": 7, "panic": true})),
                )
                .with_assertion(Assertion::new("actions_succeeded", CompareOp::Gt, 0.0)),
        };
        scenario.description = self.description().to_string();
        scenario.metrics = default_metrics();
        scenario
    }
}

/// Sample every 5 ticks, tracking market and engine counters.
pub fn default_metrics() -> MetricsConfig {
    let market = [
        "price",
        "reserve_base",
        "reserve_quote",
        "volume",
        "swap_count",
        "revert_count",
        "total_base",
        "total_quote",
    ];
    MetricsConfig {
        sample_every_ticks: 5,
        track: market
            .iter()
            .chain(ENGINE_METRICS.iter())
            .map(|s| s.to_string())
            .collect(),
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "baseline_market" | "baseline" => Ok(ScenarioId::BaselineMarket),
            "busy_market" | "busy" => Ok(ScenarioId::BusyMarket),
            "faulty_agents" | "faulty" => Ok(ScenarioId::FaultyAgents),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
