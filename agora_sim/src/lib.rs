//! Agora Deterministic Simulation Engine
//!
//! Runs synthetic agent populations against a market model, tick by tick,
//! and leaves behind artifacts whose hashes prove two runs were identical.
//!
//! # Core Principle: One Seed, One Run
//!
//! All sources of non-determinism are removed or controlled:
//! - **Time**: virtual, `tick * seconds_per_tick`; wall clock only feeds
//!   informational durations that are never hashed
//! - **Randomness**: every draw comes from `SimRng::derive` of one seed
//! - **Ordering**: agent order comes from the scheduler, output maps are
//!   ordered
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SimulationEngine                        │
//! │                                                              │
//! │  Scheduler ──order──► Agent::decide ──► Precondition gate    │
//! │      ▲                     ▲                   │             │
//! │      │ derive(tick)        │ derive(tick, id)  ▼             │
//! │  ┌───┴─────────────────────┴──┐         Pack::apply          │
//! │  │        SimRng(seed)        │               │              │
//! │  └────────────────────────────┘               ▼              │
//! │                          MetricsCollector, action log        │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//!       summary.json  config_resolved.json  actions.ndjson  metrics.csv
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use agora_sim::{run_scenario, scenarios::ScenarioId, CancelToken};
//!
//! let scenario = ScenarioId::BaselineMarket.build(42);
//! let result = run_scenario(scenario, Some("out/run-42".into()), CancelToken::new())?;
//! println!("actions hash: {}", result.hashes.actions);
//! ```

mod agents;
mod engine;
mod error;
mod exporter;
mod scenario;
pub mod scenarios;
mod token_pack;

pub use agents::{
    AgentFactory, AgentRegistry, Faulty, Idle, LiquidityHog, MomentumTrader, RandomTrader,
};
pub use engine::{CancelToken, RunPhase, RunResult, SimulationEngine, ENGINE_METRICS};
pub use error::{SimError, SimResult};
pub use exporter::ArtifactsWriter;
pub use scenario::{RosterEntry, Scenario};
pub use token_pack::{Side, TokenPack, TokenPackParams, TokenWorld, BASE, QUOTE, TREASURY};

use std::path::PathBuf;

/// Runs `scenario` against the pack it names, with the builtin agents.
pub fn run_scenario(
    scenario: Scenario,
    output_dir: Option<PathBuf>,
    cancel: CancelToken,
) -> SimResult<RunResult> {
    match scenario.pack.as_str() {
        token_pack::PACK_NAME => {
            let mut engine =
                SimulationEngine::new(scenario, TokenPack::new(), AgentRegistry::with_builtins())
                    .with_cancel_token(cancel);
            if let Some(dir) = output_dir {
                engine = engine.with_output_dir(dir);
            }
            engine.run()
        }
        other => Err(SimError::config(format!("Unknown pack: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenarios::ScenarioId;

    #[test]
    fn test_builtin_scenarios_run_and_reproduce() {
        for id in ScenarioId::all() {
            let a = run_scenario(id.build(42), None, CancelToken::new()).unwrap();
            let b = run_scenario(id.build(42), None, CancelToken::new()).unwrap();
            assert!(a.success, "{} failed: {:?}", id, a.failed_assertions);
            assert_eq!(a.hashes, b.hashes, "{} is not reproducible", id);
        }
    }

    #[test]
    fn test_busy_market_batches_time_out() {
        let result =
            run_scenario(ScenarioId::BusyMarket.build(7), None, CancelToken::new()).unwrap();
        let timeouts = result
            .actions()
            .iter()
            .filter(|r| r.outcome.kind() == Some(agora_env::FailureKind::Timeout))
            .count();
        assert!(timeouts > 0);
    }

    #[test]
    fn test_reloaded_runs_verify_and_compare_equivalent() {
        use agora_core::{ArtifactSet, Comparator, Verdict, DEFAULT_THRESHOLD};

        let dir = tempfile::tempdir().unwrap();
        let (a_dir, b_dir) = (dir.path().join("a"), dir.path().join("b"));
        let scenario = || ScenarioId::BusyMarket.build(42);
        run_scenario(scenario(), Some(a_dir.clone()), CancelToken::new()).unwrap();
        run_scenario(scenario(), Some(b_dir.clone()), CancelToken::new()).unwrap();

        let a = ArtifactSet::load(&a_dir).unwrap();
        let b = ArtifactSet::load(&b_dir).unwrap();
        assert!(a.verify());
        assert!(b.verify());
        assert!(!a.actions.is_empty());

        let cmp = Comparator::new(DEFAULT_THRESHOLD).compare(&a, &b);
        assert!(cmp.hashes_match);
        assert_eq!(cmp.verdict, Verdict::Equivalent);
    }

    #[test]
    fn test_unknown_pack_is_configuration_error() {
        let mut scenario = ScenarioId::BaselineMarket.build(1);
        scenario.pack = "lending".into();
        let err = run_scenario(scenario, None, CancelToken::new()).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }
}
