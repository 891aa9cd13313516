//! Precondition gates evaluated before an action reaches the pack.
//!
//! A precondition is a pure predicate over (world snapshot, agent memory,
//! parameters). Failure is an ordinary outcome carrying a reason, never an
//! error. Gates compose with `All` / `Any` to arbitrary depth.

use agora_env::{AgentMemory, StateView};
use serde::{Deserialize, Serialize};

/// Comparison operator shared by preconditions and run assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOp {
    /// Evaluates `lhs <op> rhs`.
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Pass/fail verdict plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionResult {
    pub passed: bool,
    pub reason: String,
}

impl PreconditionResult {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// Everything a gate may inspect.
#[derive(Clone, Copy)]
pub struct PreconditionEnv<'a> {
    pub world: &'a dyn StateView,
    pub memory: &'a AgentMemory,
    pub tick: u64,
    pub timestamp: u64,
}

/// A composable gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Precondition {
    /// Always passes
    #[default]
    Always,

    /// `account` holds at least `min` of `asset`
    MinBalance {
        account: String,
        asset: String,
        min: f64,
    },

    /// `owner` approved `spender` for at least `min` of `asset`
    MinAllowance {
        owner: String,
        spender: String,
        asset: String,
        min: f64,
    },

    /// Virtual timestamp lies in `[start, end)`
    TimeWindow { start: u64, end: u64 },

    /// At least `ticks` ticks since the tick stored under memory `key`
    CooldownElapsed { key: String, ticks: u64 },

    /// World value `key` satisfies `<op> value`
    Compare { key: String, op: CompareOp, value: f64 },

    /// World value `key` lies in `[min, max]`
    InRange { key: String, min: f64, max: f64 },

    /// Every gate passes (short-circuits on the first failure)
    All { of: Vec<Precondition> },

    /// At least one gate passes
    Any { of: Vec<Precondition> },
}

impl Precondition {
    pub fn min_balance(account: &str, asset: &str, min: f64) -> Self {
        Self::MinBalance {
            account: account.to_string(),
            asset: asset.to_string(),
            min,
        }
    }

    pub fn min_allowance(owner: &str, spender: &str, asset: &str, min: f64) -> Self {
        Self::MinAllowance {
            owner: owner.to_string(),
            spender: spender.to_string(),
            asset: asset.to_string(),
            min,
        }
    }

    pub fn cooldown(key: &str, ticks: u64) -> Self {
        Self::CooldownElapsed {
            key: key.to_string(),
            ticks,
        }
    }

    pub fn compare(key: &str, op: CompareOp, value: f64) -> Self {
        Self::Compare {
            key: key.to_string(),
            op,
            value,
        }
    }

    pub fn all(of: Vec<Precondition>) -> Self {
        Self::All { of }
    }

    pub fn any(of: Vec<Precondition>) -> Self {
        Self::Any { of }
    }

    pub fn in_range(key: &str, min: f64, max: f64) -> Self {
        Self::InRange {
            key: key.to_string(),
            min,
            max,
        }
    }

    /// Evaluates the gate. Never panics and never errors.
    pub fn evaluate(&self, env: &PreconditionEnv<'_>) -> PreconditionResult {
        match self {
            Precondition::Always => PreconditionResult::pass("always"),

            Precondition::MinBalance { account, asset, min } => {
                match env.world.balance(account, asset) {
                    Some(bal) if bal >= *min => PreconditionResult::pass(format!(
                        "{} {} balance {} >= {}",
                        account, asset, bal, min
                    )),
                    Some(bal) => PreconditionResult::fail(format!(
                        "{} {} balance {} < {}",
                        account, asset, bal, min
                    )),
                    None => {
                        PreconditionResult::fail(format!("no {} balance for {}", asset, account))
                    }
                }
            }

            Precondition::MinAllowance { owner, spender, asset, min } => {
                let allowance = env.world.allowance(owner, spender, asset).unwrap_or(0.0);
                if allowance >= *min {
                    PreconditionResult::pass(format!("allowance {} >= {}", allowance, min))
                } else {
                    PreconditionResult::fail(format!(
                        "{} allowance {} -> {} is {} < {}",
                        asset, owner, spender, allowance, min
                    ))
                }
            }

            Precondition::TimeWindow { start, end } => {
                if env.timestamp >= *start && env.timestamp < *end {
                    PreconditionResult::pass(format!("t={} in [{}, {})", env.timestamp, start, end))
                } else {
                    PreconditionResult::fail(format!(
                        "t={} outside [{}, {})",
                        env.timestamp, start, end
                    ))
                }
            }

            Precondition::CooldownElapsed { key, ticks } => match env.memory.get_u64(key) {
                None => PreconditionResult::pass(format!("no previous '{}'", key)),
                Some(last) => {
                    let elapsed = env.tick.saturating_sub(last);
                    if elapsed >= *ticks {
                        PreconditionResult::pass(format!(
                            "cooldown '{}' elapsed ({} ticks)",
                            key, elapsed
                        ))
                    } else {
                        PreconditionResult::fail(format!(
                            "cooldown '{}' active: {} of {} ticks",
                            key, elapsed, ticks
                        ))
                    }
                }
            },

            Precondition::Compare { key, op, value } => match env.world.value(key) {
                Some(actual) if op.holds(actual, *value) => {
                    PreconditionResult::pass(format!("{} {} {} {}", key, actual, op, value))
                }
                Some(actual) => PreconditionResult::fail(format!(
                    "{} = {} fails {} {}",
                    key, actual, op, value
                )),
                None => PreconditionResult::fail(format!("unknown value '{}'", key)),
            },

            Precondition::InRange { key, min, max } => match env.world.value(key) {
                Some(actual) if actual >= *min && actual <= *max => {
                    PreconditionResult::pass(format!("{} = {} in [{}, {}]", key, actual, min, max))
                }
                Some(actual) => PreconditionResult::fail(format!(
                    "{} = {} outside [{}, {}]",
                    key, actual, min, max
                )),
                None => PreconditionResult::fail(format!("unknown value '{}'", key)),
            },

            Precondition::All { of: gates } => {
                for gate in gates {
                    let result = gate.evaluate(env);
                    if !result.passed {
                        return result;
                    }
                }
                PreconditionResult::pass("all passed")
            }

            Precondition::Any { of: gates } => {
                let mut reasons = Vec::with_capacity(gates.len());
                for gate in gates {
                    let result = gate.evaluate(env);
                    if result.passed {
                        return result;
                    }
                    reasons.push(result.reason);
                }
                if reasons.is_empty() {
                    PreconditionResult::fail("no alternatives")
                } else {
                    PreconditionResult::fail(reasons.join("; "))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MockWorld {
        balances: BTreeMap<(String, String), f64>,
        allowances: BTreeMap<(String, String, String), f64>,
        values: BTreeMap<String, f64>,
    }

    impl StateView for MockWorld {
        fn balance(&self, account: &str, asset: &str) -> Option<f64> {
            self.balances.get(&(account.to_string(), asset.to_string())).copied()
        }

        fn allowance(&self, owner: &str, spender: &str, asset: &str) -> Option<f64> {
            self.allowances
                .get(&(owner.to_string(), spender.to_string(), asset.to_string()))
                .copied()
        }

        fn value(&self, key: &str) -> Option<f64> {
            self.values.get(key).copied()
        }
    }

    fn world() -> MockWorld {
        let mut w = MockWorld::default();
        w.balances.insert(("alice".into(), "BASE".into()), 50.0);
        w.allowances.insert(("alice".into(), "pool".into(), "BASE".into()), 10.0);
        w.values.insert("price".into(), 2.0);
        w
    }

    fn eval(
        gate: &Precondition,
        world: &MockWorld,
        memory: &AgentMemory,
        tick: u64,
    ) -> PreconditionResult {
        let env = PreconditionEnv {
            world,
            memory,
            tick,
            timestamp: tick * 12,
        };
        gate.evaluate(&env)
    }

    #[test]
    fn test_min_balance() {
        let w = world();
        let m = AgentMemory::new();
        assert!(eval(&Precondition::min_balance("alice", "BASE", 50.0), &w, &m, 0).passed);
        assert!(!eval(&Precondition::min_balance("alice", "BASE", 51.0), &w, &m, 0).passed);

        let missing = eval(&Precondition::min_balance("bob", "BASE", 1.0), &w, &m, 0);
        assert!(!missing.passed);
        assert!(missing.reason.contains("bob"));
    }

    #[test]
    fn test_min_allowance_defaults_to_zero() {
        let w = world();
        let m = AgentMemory::new();
        let gate = Precondition::min_allowance("alice", "pool", "BASE", 10.0);
        assert!(eval(&gate, &w, &m, 0).passed);
        assert!(!eval(&Precondition::min_allowance("alice", "bob", "BASE", 0.1), &w, &m, 0).passed);
    }

    #[test]
    fn test_time_window_half_open() {
        let w = world();
        let m = AgentMemory::new();
        let gate = Precondition::TimeWindow { start: 24, end: 48 };
        assert!(!eval(&gate, &w, &m, 1).passed); // t=12
        assert!(eval(&gate, &w, &m, 2).passed); // t=24
        assert!(eval(&gate, &w, &m, 3).passed); // t=36
        assert!(!eval(&gate, &w, &m, 4).passed); // t=48
    }

    #[test]
    fn test_cooldown() {
        let w = world();
        let mut m = AgentMemory::new();
        let gate = Precondition::cooldown("last_transfer", 3);

        assert!(eval(&gate, &w, &m, 0).passed);

        m.set("last_transfer", 5u64);
        assert!(!eval(&gate, &w, &m, 6).passed);
        assert!(!eval(&gate, &w, &m, 7).passed);
        assert!(eval(&gate, &w, &m, 8).passed);
    }

    #[test]
    fn test_compare_and_range() {
        let w = world();
        let m = AgentMemory::new();
        assert!(eval(&Precondition::compare("price", CompareOp::Gt, 1.5), &w, &m, 0).passed);
        assert!(!eval(&Precondition::compare("price", CompareOp::Lt, 1.5), &w, &m, 0).passed);
        assert!(!eval(&Precondition::compare("volume", CompareOp::Gt, 0.0), &w, &m, 0).passed);

        assert!(eval(&Precondition::in_range("price", 2.0, 3.0), &w, &m, 0).passed);
        assert!(!eval(&Precondition::in_range("price", 2.5, 3.0), &w, &m, 0).passed);
    }

    #[test]
    fn test_all_short_circuits_with_first_reason() {
        let w = world();
        let m = AgentMemory::new();
        let gate = Precondition::all(vec![
            Precondition::Always,
            Precondition::compare("price", CompareOp::Gt, 10.0),
            Precondition::min_balance("nobody", "BASE", 1.0),
        ]);
        let result = eval(&gate, &w, &m, 0);
        assert!(!result.passed);
        assert!(result.reason.contains("price"));
        assert!(!result.reason.contains("nobody"));
    }

    #[test]
    fn test_any_aggregates_all_reasons() {
        let w = world();
        let m = AgentMemory::new();
        let gate = Precondition::any(vec![
            Precondition::compare("price", CompareOp::Gt, 10.0),
            Precondition::min_balance("nobody", "BASE", 1.0),
        ]);
        let result = eval(&gate, &w, &m, 0);
        assert!(!result.passed);
        assert!(result.reason.contains("price"));
        assert!(result.reason.contains("nobody"));
        assert!(result.reason.contains("; "));

        let passing = Precondition::any(vec![
            Precondition::compare("price", CompareOp::Gt, 10.0),
            Precondition::Always,
        ]);
        assert!(eval(&passing, &w, &m, 0).passed);
    }

    #[test]
    fn test_nested_combinators() {
        let w = world();
        let m = AgentMemory::new();
        let gate = Precondition::all(vec![
            Precondition::any(vec![
                Precondition::min_balance("nobody", "BASE", 1.0),
                Precondition::min_balance("alice", "BASE", 1.0),
            ]),
            Precondition::in_range("price", 0.0, 5.0),
        ]);
        assert!(eval(&gate, &w, &m, 0).passed);
    }

    #[test]
    fn test_empty_combinators() {
        let w = world();
        let m = AgentMemory::new();
        assert!(eval(&Precondition::all(vec![]), &w, &m, 0).passed);
        assert!(!eval(&Precondition::any(vec![]), &w, &m, 0).passed);
    }

    #[test]
    fn test_serde_shape() {
        let gate = Precondition::all(vec![Precondition::compare("price", CompareOp::Ge, 1.0)]);
        let json = serde_json::to_string(&gate).unwrap();
        assert!(json.contains("\"type\":\"all\""));
        assert!(json.contains("\">=\""));
        let back: Precondition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, gate);
    }
}
