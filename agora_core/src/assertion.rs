//! Post-run threshold checks against final metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::precondition::CompareOp;

/// `metric <op> value`, checked once the run has finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub metric: String,
    pub op: CompareOp,
    pub value: f64,
}

impl Assertion {
    pub fn new(metric: &str, op: CompareOp, value: f64) -> Self {
        Self {
            metric: metric.to_string(),
            op,
            value,
        }
    }

    /// Checks the assertion, returning the failure if it does not hold.
    pub fn check(&self, final_metrics: &BTreeMap<String, f64>) -> Option<AssertionFailure> {
        match final_metrics.get(&self.metric) {
            Some(actual) if self.op.holds(*actual, self.value) => None,
            Some(actual) => Some(AssertionFailure {
                assertion: self.clone(),
                actual: Some(*actual),
                message: format!(
                    "{} = {} does not satisfy {} {}",
                    self.metric, actual, self.op, self.value
                ),
            }),
            None => Some(AssertionFailure {
                assertion: self.clone(),
                actual: None,
                message: format!("{} missing from final metrics", self.metric),
            }),
        }
    }
}

impl std::fmt::Display for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.metric, self.op, self.value)
    }
}

/// An assertion that did not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub assertion: Assertion,
    pub actual: Option<f64>,
    pub message: String,
}

/// Evaluates every assertion; failures are returned, never raised.
pub fn evaluate_assertions(
    assertions: &[Assertion],
    final_metrics: &BTreeMap<String, f64>,
) -> Vec<AssertionFailure> {
    assertions
        .iter()
        .filter_map(|a| a.check(final_metrics))
        .collect()
}
