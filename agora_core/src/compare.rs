//! Run-to-run comparison.
//!
//! Diffs a baseline run (A) against a comparison run (B): metadata, KPI
//! percent changes, action and revert-reason frequencies, and the content
//! hashes that decide whether the runs were bit-identical.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::artifacts::ArtifactSet;
use crate::record::{Outcome, RecordedAction};

/// Significance threshold (percent) used when the caller gives none.
pub const DEFAULT_THRESHOLD: f64 = 10.0;

/// `(B - A) / A * 100`, or `Undefined` when A is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PercentChange {
    Percent(f64),
    Undefined,
}

impl PercentChange {
    pub fn between(baseline: f64, comparison: f64) -> Self {
        if baseline == 0.0 {
            return PercentChange::Undefined;
        }
        let pct = (comparison - baseline) * 100.0 / baseline;
        if pct.is_finite() {
            PercentChange::Percent(pct)
        } else {
            PercentChange::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PercentChange::Percent(p) => Some(*p),
            PercentChange::Undefined => None,
        }
    }
}

/// Renders a change with two decimals (`20.00`), or `n/a`.
pub fn format_percent(change: PercentChange) -> String {
    match change {
        PercentChange::Percent(p) => format!("{:.2}", p),
        PercentChange::Undefined => "n/a".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDiff {
    pub field: String,
    pub baseline: String,
    pub comparison: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDiff {
    pub metric: String,
    pub baseline: f64,
    pub comparison: f64,
    pub change: PercentChange,
    /// `|change| > threshold`; an undefined change is flagged as
    /// significant only when the value actually moved away from zero
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDiff {
    pub key: String,
    pub baseline: u64,
    pub comparison: u64,
    pub delta: i64,
}

/// What the hash and config comparison says about the pair of runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Same seed and config, identical action and metrics content
    Equivalent,
    /// Same seed and config but different content: non-determinism
    ReproducibilityBug,
    /// Seed or config differ, so differences are intentional
    ScenarioChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub threshold: f64,
    pub metadata: Vec<MetadataDiff>,
    pub kpis: Vec<KpiDiff>,
    pub only_in_baseline: Vec<String>,
    pub only_in_comparison: Vec<String>,
    pub actions: Vec<CountDiff>,
    pub revert_reasons: Vec<CountDiff>,
    pub config_hash_match: bool,
    pub actions_hash_match: bool,
    pub metrics_hash_match: bool,
    pub hashes_match: bool,
    pub verdict: Verdict,
}

impl Comparison {
    pub fn significant_changes(&self) -> impl Iterator<Item = &KpiDiff> {
        self.kpis.iter().filter(|k| k.significant)
    }

    pub fn kpi(&self, metric: &str) -> Option<&KpiDiff> {
        self.kpis.iter().find(|k| k.metric == metric)
    }
}

/// Compares two completed runs.
#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    threshold: f64,
}

impl Default for Comparator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Comparator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn compare(&self, a: &ArtifactSet, b: &ArtifactSet) -> Comparison {
        let (sa, sb) = (&a.summary, &b.summary);

        let mut metadata = Vec::new();
        let mut diff_field = |field: &str, x: String, y: String| {
            if x != y {
                metadata.push(MetadataDiff {
                    field: field.to_string(),
                    baseline: x,
                    comparison: y,
                });
            }
        };
        diff_field("scenario", sa.scenario.clone(), sb.scenario.clone());
        diff_field("seed", sa.seed.to_string(), sb.seed.to_string());
        diff_field("ticks", sa.ticks_requested.to_string(), sb.ticks_requested.to_string());
        diff_field("pack", sa.pack.clone(), sb.pack.clone());
        diff_field("config_hash", a.hashes.config.clone(), b.hashes.config.clone());

        let mut kpis = Vec::new();
        let mut only_in_baseline = Vec::new();
        for (metric, &va) in &sa.final_metrics {
            match sb.final_metrics.get(metric) {
                Some(&vb) => {
                    let change = PercentChange::between(va, vb);
                    let significant = match change {
                        PercentChange::Percent(p) => p.abs() > self.threshold,
                        PercentChange::Undefined => vb != va,
                    };
                    kpis.push(KpiDiff {
                        metric: metric.clone(),
                        baseline: va,
                        comparison: vb,
                        change,
                        significant,
                    });
                }
                None => only_in_baseline.push(metric.clone()),
            }
        }
        let only_in_comparison = sb
            .final_metrics
            .keys()
            .filter(|k| !sa.final_metrics.contains_key(*k))
            .cloned()
            .collect();

        let config_hash_match = a.hashes.config == b.hashes.config;
        let actions_hash_match = a.hashes.actions == b.hashes.actions;
        let metrics_hash_match = a.hashes.metrics == b.hashes.metrics;
        let hashes_match = actions_hash_match && metrics_hash_match;

        let verdict = if sa.seed == sb.seed && config_hash_match {
            if hashes_match {
                Verdict::Equivalent
            } else {
                Verdict::ReproducibilityBug
            }
        } else {
            Verdict::ScenarioChanged
        };

        debug!(
            "compare: {} kpis, hashes_match={}, verdict={:?}",
            kpis.len(),
            hashes_match,
            verdict
        );

        Comparison {
            threshold: self.threshold,
            metadata,
            kpis,
            only_in_baseline,
            only_in_comparison,
            actions: count_diffs(&action_counts(&a.actions), &action_counts(&b.actions)),
            revert_reasons: count_diffs(&revert_counts(&a.actions), &revert_counts(&b.actions)),
            config_hash_match,
            actions_hash_match,
            metrics_hash_match,
            hashes_match,
            verdict,
        }
    }
}

/// Frequency of each proposed action name.
pub fn action_counts(actions: &[RecordedAction]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for name in actions.iter().filter_map(RecordedAction::action_name) {
        *counts.entry(name.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Frequency of each failure reason reported by the pack.
pub fn revert_counts(actions: &[RecordedAction]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for record in actions {
        if let Outcome::Applied(result) = &record.outcome {
            if let Some(reason) = result.revert_reason() {
                *counts.entry(reason.to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}

fn count_diffs(a: &BTreeMap<String, u64>, b: &BTreeMap<String, u64>) -> Vec<CountDiff> {
    let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .map(|key| {
            let baseline = a.get(key).copied().unwrap_or(0);
            let comparison = b.get(key).copied().unwrap_or(0);
            CountDiff {
                key: key.clone(),
                baseline,
                comparison,
                delta: comparison as i64 - baseline as i64,
            }
        })
        .collect()
}
