//! SimulationEngine - the tick loop.
//!
//! # Phases
//!
//! ```text
//! Initializing ──► Running(0) ──► ... ──► Running(n-1) ──► Finalizing ──► Completed
//!      │                                                                  └► Failed
//!      └──► (configuration error, no tick executed)
//! ```
//!
//! # One tick
//!
//! 1. Check the cancel token.
//! 2. `Pack::advance` moves the world clock.
//! 3. The scheduler orders the enabled agents from `root.derive(tick, None)`.
//! 4. Each agent decides with its own `root.derive(tick, agent_id)` stream;
//!    its proposal is gated by preconditions, then applied.
//! 5. Metrics are sampled if the tick is on the cadence.
//!
//! Agent errors and panics are confined to the agent's turn. A pack that
//! panics in `apply` aborts the run with `SimError::Internal`, and no
//! artifacts are written.

use agora_core::{
    evaluate_assertions, AgentStats, Agent, ArtifactSet, ContentHashes, MetricsCollector, Outcome,
    PreconditionEnv, RecordedAction, RunStatus, RunSummary, Scheduler,
};
use agora_core::assertion::AssertionFailure;
use agora_env::{
    AgentId, AgentMemory, ApplyContext, MetricSource, Pack, PackSetup, SimRng, TickContext,
};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::agents::AgentRegistry;
use crate::error::{SimError, SimResult};
use crate::exporter::ArtifactsWriter;
use crate::scenario::Scenario;

/// Engine counters layered over the pack's metrics.
pub const ENGINE_METRICS: [&str; 4] = [
    "actions_attempted",
    "actions_succeeded",
    "actions_failed",
    "actions_rejected",
];

/// Lifecycle of a run, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    Running(u64),
    Finalizing,
    Completed,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Initializing => write!(f, "initializing"),
            RunPhase::Running(tick) => write!(f, "running(tick={})", tick),
            RunPhase::Finalizing => write!(f, "finalizing"),
            RunPhase::Completed => write!(f, "completed"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Shared flag that stops a run before its next tick.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub success: bool,
    pub status: RunStatus,
    /// Wall-clock duration of the run
    pub duration: Duration,
    pub ticks_executed: u64,
    pub final_metrics: BTreeMap<String, f64>,
    pub failed_assertions: Vec<AssertionFailure>,
    pub agent_stats: BTreeMap<String, AgentStats>,
    pub hashes: ContentHashes,
    /// Set when artifacts were written
    pub output_dir: Option<PathBuf>,
    /// Everything that was (or would have been) written
    pub artifacts: ArtifactSet,
}

impl RunResult {
    /// Process exit code: 0 on success, 1 for failed assertions or timeout.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }

    pub fn actions(&self) -> &[RecordedAction] {
        &self.artifacts.actions
    }
}

/// One agent plus the state the engine keeps for it.
struct AgentSlot<V> {
    id: AgentId,
    agent: Box<dyn Agent<V>>,
    memory: AgentMemory,
    stats: AgentStats,
}

/// Pack metrics overlaid with the engine's own counters.
struct EngineMetrics<'a, P> {
    pack: &'a P,
    totals: &'a AgentStats,
}

impl<P: Pack> MetricSource for EngineMetrics<'_, P> {
    fn metric(&self, key: &str) -> Option<f64> {
        match key {
            "actions_attempted" => Some(self.totals.actions_attempted as f64),
            "actions_succeeded" => Some(self.totals.actions_succeeded as f64),
            "actions_failed" => Some(self.totals.actions_failed as f64),
            "actions_rejected" => Some(self.totals.actions_rejected as f64),
            _ => self.pack.metric(key),
        }
    }
}

/// Runs one scenario against one pack.
pub struct SimulationEngine<P: Pack> {
    scenario: Scenario,
    pack: P,
    registry: AgentRegistry<P::View>,
    cancel: CancelToken,
    output_dir: Option<PathBuf>,
    phase: RunPhase,
}

impl<P: Pack> SimulationEngine<P> {
    pub fn new(scenario: Scenario, pack: P, registry: AgentRegistry<P::View>) -> Self {
        Self {
            scenario,
            pack,
            registry,
            cancel: CancelToken::new(),
            output_dir: None,
            phase: RunPhase::Initializing,
        }
    }

    /// Writes artifacts to `dir` when the run finishes.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that stops the run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        match phase {
            RunPhase::Running(_) => debug!("[{}] phase -> {}", self.scenario.name, phase),
            _ => info!("[{}] phase -> {}", self.scenario.name, phase),
        }
        self.phase = phase;
    }

    /// Runs the scenario to completion or cancellation.
    ///
    /// Returns `Err` only for fatal errors (invalid configuration, failed
    /// artifact IO). Agent faults, rejected actions, failed assertions and
    /// timeouts all produce an `Ok(RunResult)`.
    pub fn run(mut self) -> SimResult<RunResult> {
        let started = Instant::now();
        self.enter(RunPhase::Initializing);

        let setup = self.initialize();
        let (mut slots, scheduler) = match setup {
            Ok(parts) => parts,
            Err(e) => {
                self.enter(RunPhase::Failed);
                return Err(e);
            }
        };
        let root = SimRng::new(self.scenario.seed);
        let mut collector = MetricsCollector::new(self.scenario.metrics.clone());
        let mut log: Vec<RecordedAction> = Vec::new();
        let mut totals = AgentStats::new("*");

        info!(
            "Starting scenario: {} (seed={}, ticks={}, agents={}/{} enabled, schedule={:?})",
            self.scenario.name,
            self.scenario.seed,
            self.scenario.ticks,
            scheduler.enabled_count(),
            slots.len(),
            scheduler.strategy()
        );

        let mut ticks_executed = 0;
        let mut timed_out = false;
        for tick in 0..self.scenario.ticks {
            if self.cancel.is_cancelled() {
                warn!(
                    "[{}] cancelled before tick {}; finalizing {} completed ticks",
                    self.scenario.name, tick, ticks_executed
                );
                timed_out = true;
                break;
            }
            self.enter(RunPhase::Running(tick));
            let timestamp = tick * self.scenario.seconds_per_tick;
            self.pack.advance(tick, timestamp);

            for idx in scheduler.order(&root, tick) {
                let slot = &mut slots[idx];
                match execute_turn(&mut self.pack, slot, idx as u32, tick, timestamp, &root) {
                    Ok(Some(record)) => {
                        totals.record(&record.outcome);
                        log.push(record);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.enter(RunPhase::Failed);
                        return Err(e);
                    }
                }
            }

            let source = EngineMetrics {
                pack: &self.pack,
                totals: &totals,
            };
            collector.maybe_sample(tick, timestamp, &source);
            ticks_executed = tick + 1;

            if tick % 10 == 0 {
                debug!("  tick={} | actions={}", tick, log.len());
            }
        }

        self.enter(RunPhase::Finalizing);
        if ticks_executed > 0 {
            let last = ticks_executed - 1;
            let source = EngineMetrics {
                pack: &self.pack,
                totals: &totals,
            };
            collector.sample(last, last * self.scenario.seconds_per_tick, &source);
        }

        let final_metrics = collector.final_metrics();
        let failed_assertions = evaluate_assertions(&self.scenario.assertions, &final_metrics);
        let status = if timed_out {
            RunStatus::TimedOut
        } else if !failed_assertions.is_empty() {
            RunStatus::AssertionsFailed
        } else {
            RunStatus::Completed
        };
        let success = status == RunStatus::Completed;

        for failure in &failed_assertions {
            warn!("[{}] assertion failed: {}", self.scenario.name, failure.message);
        }

        let agent_stats: BTreeMap<String, AgentStats> = slots
            .iter()
            .map(|slot| (slot.id.to_string(), slot.stats.clone()))
            .collect();
        let duration = started.elapsed();

        let summary = RunSummary {
            scenario: self.scenario.name.clone(),
            seed: self.scenario.seed,
            pack: self.pack.name().to_string(),
            status,
            success,
            ticks_requested: self.scenario.ticks,
            ticks_executed,
            seconds_per_tick: self.scenario.seconds_per_tick,
            duration_ms: duration.as_millis() as u64,
            final_metrics: final_metrics.clone(),
            failed_assertions: failed_assertions.clone(),
            agent_stats: agent_stats.clone(),
            hashes: ContentHashes::default(),
        };
        let metric_keys = collector.keys().to_vec();
        let mut artifacts = ArtifactSet::from_parts(
            summary,
            self.scenario.resolved()?,
            log,
            metric_keys,
            collector.into_samples(),
        )?;
        artifacts.summary.hashes = artifacts.hashes.clone();

        if let Some(dir) = &self.output_dir {
            ArtifactsWriter::new(dir).write(&artifacts)?;
            artifacts.dir = Some(dir.clone());
        }

        self.enter(if success { RunPhase::Completed } else { RunPhase::Failed });
        info!(
            "[{}] {} in {:?}: {} ticks, {} actions, hashes actions={} metrics={}",
            self.scenario.name,
            status,
            duration,
            ticks_executed,
            totals.actions_attempted,
            artifacts.hashes.actions,
            artifacts.hashes.metrics
        );

        Ok(RunResult {
            success,
            status,
            duration,
            ticks_executed,
            final_metrics,
            failed_assertions,
            agent_stats,
            hashes: artifacts.hashes.clone(),
            output_dir: self.output_dir.clone(),
            artifacts,
        })
    }

    /// Validates the scenario, builds agents and initializes the pack.
    fn initialize(&mut self) -> SimResult<(Vec<AgentSlot<P::View>>, Scheduler)> {
        self.scenario.validate()?;

        let roster = self.scenario.expand_roster();
        let mut slots = Vec::with_capacity(roster.len());
        for (id, entry) in &roster {
            let agent = self
                .registry
                .build(&entry.agent_type, id, &entry.params)
                .map_err(|e| SimError::config(format!("{}: {}", id, e)))?;
            slots.push(AgentSlot {
                id: id.clone(),
                agent,
                memory: AgentMemory::new(),
                stats: AgentStats::new(&entry.agent_type),
            });
        }

        let scheduler = Scheduler::new(self.scenario.schedule, self.scenario.schedule_slots())?;

        if self.pack.name() != self.scenario.pack {
            return Err(SimError::config(format!(
                "scenario wants pack '{}', engine has '{}'",
                self.scenario.pack,
                self.pack.name()
            )));
        }
        let ids: Vec<AgentId> = roster.into_iter().map(|(id, _)| id).collect();
        self.pack.initialize(&PackSetup {
            params: &self.scenario.pack_params,
            seconds_per_tick: self.scenario.seconds_per_tick,
            agents: &ids,
        })?;

        Ok((slots, scheduler))
    }
}

/// Runs one agent's turn. Returns `None` when the agent declined to act.
///
/// The only error is a pack panic: after one, the world can no longer be
/// trusted to be consistent.
fn execute_turn<P: Pack>(
    pack: &mut P,
    slot: &mut AgentSlot<P::View>,
    ordinal: u32,
    tick: u64,
    timestamp: u64,
    root: &SimRng,
) -> SimResult<Option<RecordedAction>> {
    let view = pack.snapshot();
    let rng = root.derive(tick, Some(slot.id.as_str()));

    let decision = {
        let mut ctx = TickContext::new(
            tick,
            timestamp,
            &slot.id,
            ordinal,
            &view,
            rng,
            &mut slot.memory,
        );
        let agent = &mut slot.agent;
        panic::catch_unwind(AssertUnwindSafe(|| agent.decide(&mut ctx)))
    };

    let mut record = RecordedAction {
        tick,
        timestamp,
        agent_id: slot.id.clone(),
        agent_type: slot.stats.agent_type.clone(),
        action: None,
        outcome: Outcome::AgentError {
            reason: String::new(),
        },
        duration: Duration::ZERO,
    };

    let action = match decision {
        Ok(Ok(None)) => return Ok(None),
        Ok(Ok(Some(action))) => action,
        Ok(Err(e)) => {
            warn!("[tick {}] agent {} failed: {}", tick, slot.id, e);
            record.outcome = Outcome::AgentError {
                reason: e.to_string(),
            };
            slot.stats.record(&record.outcome);
            return Ok(Some(record));
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!("[tick {}] agent {} panicked: {}", tick, slot.id, reason);
            record.outcome = Outcome::AgentError {
                reason: format!("panic: {}", reason),
            };
            slot.stats.record(&record.outcome);
            return Ok(Some(record));
        }
    };

    let gate = slot.agent.preconditions(&action);
    let check = gate.evaluate(&PreconditionEnv {
        world: &view,
        memory: &slot.memory,
        tick,
        timestamp,
    });

    record.outcome = if check.passed {
        let started = Instant::now();
        let ctx = ApplyContext {
            tick,
            timestamp,
            agent: &slot.id,
        };
        let applied = panic::catch_unwind(AssertUnwindSafe(|| pack.apply(&ctx, &action)));
        record.duration = started.elapsed();
        let result = applied.map_err(|payload| {
            SimError::Internal(format!(
                "pack '{}' panicked applying '{}' for {} at tick {}: {}",
                pack.name(),
                action.name,
                slot.id,
                tick,
                panic_message(payload.as_ref())
            ))
        })?;
        Outcome::Applied(result)
    } else {
        Outcome::Rejected { reason: check.reason }
    };

    slot.agent.observe(tick, &action, &record.outcome, &mut slot.memory);
    slot.stats.record(&record.outcome);
    record.action = Some(action);
    Ok(Some(record))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
