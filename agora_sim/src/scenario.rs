//! Scenario - the immutable configuration of one run.

use agora_core::{Assertion, MetricsConfig, ScheduleSlot, ScheduleStrategy};
use agora_env::AgentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{SimError, SimResult};

/// One line of the agent roster: `count` agents of the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Agent type tag, resolved through the agent registry
    #[serde(rename = "type")]
    pub agent_type: String,

    #[serde(default = "default_count")]
    pub count: usize,

    /// Constructor parameters, passed to every agent of this entry
    #[serde(default = "empty_object")]
    pub params: Value,

    /// Relative weight under the `weighted` schedule
    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl RosterEntry {
    pub fn new(agent_type: &str, count: usize) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            count,
            params: empty_object(),
            weight: default_weight(),
            enabled: default_enabled(),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Master seed for determinism
    pub seed: u64,

    /// Number of ticks to execute
    pub ticks: u64,

    /// Virtual seconds per tick
    #[serde(default = "default_seconds_per_tick")]
    pub seconds_per_tick: u64,

    #[serde(default)]
    pub schedule: ScheduleStrategy,

    pub agents: Vec<RosterEntry>,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub assertions: Vec<Assertion>,

    /// Pack name
    #[serde(default = "default_pack")]
    pub pack: String,

    /// Pack-specific initialization parameters
    #[serde(default = "empty_object")]
    pub pack_params: Value,
}

fn default_count() -> usize {
    1
}

fn default_weight() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

fn default_seconds_per_tick() -> u64 {
    12
}

fn default_pack() -> String {
    "token".to_string()
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Scenario {
    /// Creates a scenario with defaults for everything but the essentials.
    pub fn new(name: &str, seed: u64, ticks: u64) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            seed,
            ticks,
            seconds_per_tick: default_seconds_per_tick(),
            schedule: ScheduleStrategy::default(),
            agents: Vec::new(),
            metrics: MetricsConfig::default(),
            assertions: Vec::new(),
            pack: default_pack(),
            pack_params: empty_object(),
        }
    }

    /// Parses a scenario from JSON text.
    pub fn from_json(text: &str) -> SimResult<Self> {
        serde_json::from_str(text).map_err(|e| SimError::config(format!("invalid scenario: {}", e)))
    }

    /// Loads a scenario from a JSON file.
    pub fn from_file(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        Self::from_json(&text)
    }

    /// Overrides the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Overrides the tick count.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleStrategy) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_agents(mut self, entry: RosterEntry) -> Self {
        self.agents.push(entry);
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Structural checks. Anything that fails here is a configuration
    /// error and the run never starts.
    pub fn validate(&self) -> SimResult<()> {
        if self.name.trim().is_empty() {
            return Err(SimError::config("scenario name must not be empty"));
        }
        if self.ticks == 0 {
            return Err(SimError::config("ticks must be at least 1"));
        }
        if self.seconds_per_tick == 0 {
            return Err(SimError::config("seconds_per_tick must be at least 1"));
        }
        if self.metrics.sample_every_ticks == 0 {
            return Err(SimError::config("metrics.sample_every_ticks must be at least 1"));
        }
        if self.agents.is_empty() {
            return Err(SimError::config("agent roster is empty"));
        }

        for (i, entry) in self.agents.iter().enumerate() {
            if entry.agent_type.trim().is_empty() {
                return Err(SimError::config(format!("roster entry {} has no type", i)));
            }
            if entry.count == 0 {
                return Err(SimError::config(format!(
                    "roster entry {} ({}) has count 0",
                    i, entry.agent_type
                )));
            }
            if !entry.params.is_object() {
                return Err(SimError::config(format!(
                    "roster entry {} ({}) params must be an object",
                    i, entry.agent_type
                )));
            }
            if self.schedule == ScheduleStrategy::Weighted
                && entry.enabled
                && !(entry.weight.is_finite() && entry.weight > 0.0)
            {
                return Err(SimError::config(format!(
                    "roster entry {} ({}) needs a positive weight under weighted scheduling, got {}",
                    i, entry.agent_type, entry.weight
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for key in &self.metrics.track {
            if !seen.insert(key.as_str()) {
                return Err(SimError::config(format!("metric '{}' tracked twice", key)));
            }
            if key.contains(',') || key.contains('\n') {
                return Err(SimError::config(format!("metric key '{}' is not CSV-safe", key)));
            }
        }

        for assertion in &self.assertions {
            if !assertion.value.is_finite() {
                return Err(SimError::config(format!(
                    "assertion '{}' has a non-finite value",
                    assertion
                )));
            }
        }

        Ok(())
    }

    /// Total number of agents across the roster.
    pub fn agent_count(&self) -> usize {
        self.agents.iter().map(|e| e.count).sum()
    }

    /// Expands the roster into `(id, entry)` pairs in roster order.
    ///
    /// Indices are per type, so two entries of the same type continue the
    /// numbering instead of colliding.
    pub fn expand_roster(&self) -> Vec<(AgentId, &RosterEntry)> {
        let mut next_index: std::collections::BTreeMap<&str, usize> = Default::default();
        let mut out = Vec::with_capacity(self.agent_count());
        for entry in &self.agents {
            let counter = next_index.entry(entry.agent_type.as_str()).or_insert(0);
            for _ in 0..entry.count {
                out.push((AgentId::from_roster(&entry.agent_type, *counter), entry));
                *counter += 1;
            }
        }
        out
    }

    /// Scheduling slots, one per expanded agent.
    pub fn schedule_slots(&self) -> Vec<ScheduleSlot> {
        self.expand_roster()
            .into_iter()
            .map(|(_, entry)| ScheduleSlot {
                weight: entry.weight,
                enabled: entry.enabled,
            })
            .collect()
    }

    /// The fully expanded configuration that gets written and hashed.
    pub fn resolved(&self) -> SimResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::CompareOp;
    use serde_json::json;

    fn scenario() -> Scenario {
        Scenario::new("test", 42, 10)
            .with_agents(RosterEntry::new("random_trader", 2))
            .with_agents(RosterEntry::new("idle", 1))
    }

    #[test]
    fn test_defaults_from_minimal_json() {
        let s = Scenario::from_json(
            r#"{"name":"m","seed":7,"ticks":5,"agents":[{"type":"idle"}]}"#,
        )
        .unwrap();
        assert_eq!(s.seconds_per_tick, 12);
        assert_eq!(s.schedule, ScheduleStrategy::Sequential);
        assert_eq!(s.pack, "token");
        assert_eq!(s.agents[0].count, 1);
        assert_eq!(s.agents[0].weight, 1.0);
        assert!(s.agents[0].enabled);
        assert_eq!(s.metrics.sample_every_ticks, 1);
        s.validate().unwrap();
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let err = Scenario::from_json("{not json").unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn test_expand_roster_ids() {
        let s = scenario().with_agents(RosterEntry::new("random_trader", 1));
        let ids: Vec<String> = s.expand_roster().iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["random_trader-0", "random_trader-1", "idle-0", "random_trader-2"]
        );
        assert_eq!(s.agent_count(), 4);
    }

    #[test]
    fn test_validation_failures() {
        assert!(scenario().with_ticks(0).validate().is_err());
        assert!(Scenario::new("empty", 1, 1).validate().is_err());

        let mut zero_count = scenario();
        zero_count.agents[0].count = 0;
        assert!(zero_count.validate().is_err());

        let mut bad_params = scenario();
        bad_params.agents[0].params = json!([1, 2]);
        assert!(bad_params.validate().is_err());

        let mut dup = scenario();
        dup.metrics.track = vec!["price".into(), "price".into()];
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_weighted_requires_positive_weights() {
        let s = Scenario::new("w", 1, 1)
            .with_schedule(ScheduleStrategy::Weighted)
            .with_agents(RosterEntry::new("idle", 1).with_weight(0.0));
        assert!(s.validate().is_err());

        let disabled = Scenario::new("w", 1, 1)
            .with_schedule(ScheduleStrategy::Weighted)
            .with_agents(RosterEntry::new("idle", 1))
            .with_agents(RosterEntry::new("idle", 1).with_weight(0.0).disabled());
        disabled.validate().unwrap();
    }

    #[test]
    fn test_resolved_config_round_trips() {
        let s = scenario()
            .with_seed(99)
            .with_assertion(Assertion::new("volume", CompareOp::Ge, 0.0));
        let value = s.resolved().unwrap();
        assert_eq!(value["seed"], json!(99));
        let back: Scenario = serde_json::from_value(value).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_schedule_slots_follow_roster() {
        let s = Scenario::new("s", 1, 1)
            .with_agents(RosterEntry::new("a", 2).with_weight(3.0))
            .with_agents(RosterEntry::new("b", 1).disabled());
        let slots = s.schedule_slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[1].weight, 3.0);
        assert!(!slots[2].enabled);
    }
}
