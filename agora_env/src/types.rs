//! Common types shared by the engine, packs and agents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier of an agent within a run (`<type>-<index>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    /// Builds the id for the `index`-th agent of a roster entry.
    pub fn from_roster(agent_type: &str, index: usize) -> Self {
        Self(format!("{}-{}", agent_type, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Deterministic action identifier.
///
/// Built from (tick, agent ordinal, per-turn sequence) rather than OS
/// entropy so that action logs are reproducible byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn from_parts(tick: u64, agent_ordinal: u32, seq: u32) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&tick.to_be_bytes());
        bytes[8..12].copy_from_slice(&agent_ordinal.to_be_bytes());
        bytes[12..16].copy_from_slice(&seq.to_be_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A proposed operation against the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl Action {
    /// Creates an action without parameters. The id is assigned by
    /// `TickContext::action`, which agents should normally use instead.
    pub fn new(id: ActionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a parameter (builder style).
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Classification of a non-successful action outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The pack rejected the action on purpose (on-chain style revert)
    Revert,
    /// A gate failed before application was attempted
    Precondition,
    /// The action exceeded its execution budget
    Timeout,
    /// The agent's decision logic failed
    AgentInternal,
    /// Anything else
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Revert => "revert",
            FailureKind::Precondition => "precondition",
            FailureKind::Timeout => "timeout",
            FailureKind::AgentInternal => "agent_internal",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying an action through a pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            kind: None,
            reason: None,
            data: None,
        }
    }

    pub fn ok_with(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: Some(kind),
            reason: Some(reason.into()),
            data: None,
        }
    }

    pub fn revert(reason: impl Into<String>) -> Self {
        Self::failed(FailureKind::Revert, reason)
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::failed(FailureKind::Timeout, reason)
    }

    /// Reason string for failures, `None` on success.
    pub fn revert_reason(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            self.reason.as_deref()
        }
    }
}

/// Private per-agent memory, persisted by the engine across ticks.
///
/// Ordered map so that anything derived from it iterates deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentMemory(BTreeMap<String, Value>);

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
