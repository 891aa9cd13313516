//! Run artifact formats and loading.
//!
//! A run directory holds four files:
//!
//! | File                   | Content                                   |
//! |------------------------|-------------------------------------------|
//! | `summary.json`         | `RunSummary` (status, metrics, hashes)    |
//! | `config_resolved.json` | Fully expanded scenario                   |
//! | `actions.ndjson`       | One `RecordedAction` per line             |
//! | `metrics.csv`          | `tick,timestamp,<keys...>` time series    |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::assertion::AssertionFailure;
use crate::hash::{
    canonical_json, canonical_ndjson, canonical_value, digest, metrics_csv, ContentHashes,
};
use crate::metrics::MetricsSample;
use crate::record::{AgentStats, RecordedAction};

pub const SUMMARY_FILE: &str = "summary.json";
pub const CONFIG_FILE: &str = "config_resolved.json";
pub const ACTIONS_FILE: &str = "actions.ndjson";
pub const METRICS_FILE: &str = "metrics.csv";

/// Errors reading or writing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Malformed metrics CSV at line {line}: {reason}")]
    Csv { line: usize, reason: String },
}

impl ArtifactError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// All ticks executed and all assertions held
    Completed,
    /// All ticks executed, at least one assertion failed
    AssertionsFailed,
    /// Cancelled before the last tick; artifacts cover completed ticks
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::AssertionsFailed => "assertions_failed",
            RunStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scenario: String,
    pub seed: u64,
    pub pack: String,
    pub status: RunStatus,
    pub success: bool,
    pub ticks_requested: u64,
    pub ticks_executed: u64,
    pub seconds_per_tick: u64,

    /// Wall-clock run time. Informational only, never hashed.
    pub duration_ms: u64,

    pub final_metrics: BTreeMap<String, f64>,
    pub failed_assertions: Vec<AssertionFailure>,
    pub agent_stats: BTreeMap<String, AgentStats>,
    pub hashes: ContentHashes,
}

/// One run's artifacts, parsed, with hashes recomputed from content.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub dir: Option<PathBuf>,
    pub summary: RunSummary,
    pub config: Value,
    pub actions: Vec<RecordedAction>,
    pub metric_keys: Vec<String>,
    pub metrics: Vec<MetricsSample>,
    pub hashes: ContentHashes,
}

impl ArtifactSet {
    /// Assembles a set from in-memory parts, computing canonical hashes.
    pub fn from_parts(
        summary: RunSummary,
        config: Value,
        actions: Vec<RecordedAction>,
        metric_keys: Vec<String>,
        metrics: Vec<MetricsSample>,
    ) -> Result<Self, ArtifactError> {
        let hashes = ContentHashes {
            config: digest(canonical_json(&config)?.as_bytes()),
            actions: digest(canonical_ndjson(&actions)?.as_bytes()),
            metrics: digest(metrics_csv(&metric_keys, &metrics).as_bytes()),
        };
        Ok(Self {
            dir: None,
            summary,
            config,
            actions,
            metric_keys,
            metrics,
            hashes,
        })
    }

    /// Loads and re-canonicalizes a run directory.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let summary: RunSummary = read_json(&dir.join(SUMMARY_FILE))?;
        let config: Value = read_json(&dir.join(CONFIG_FILE))?;

        let actions_path = dir.join(ACTIONS_FILE);
        let actions_text = read_text(&actions_path)?;
        let mut actions = Vec::new();
        let mut canonical_actions = String::new();
        for line in actions_text.lines().filter(|l| !l.trim().is_empty()) {
            let value: Value = serde_json::from_str(line).map_err(|source| ArtifactError::Json {
                path: actions_path.clone(),
                source,
            })?;
            canonical_actions.push_str(&canonical_value(value.clone()));
            canonical_actions.push('\n');
            let record: RecordedAction =
                serde_json::from_value(value).map_err(|source| ArtifactError::Json {
                    path: actions_path.clone(),
                    source,
                })?;
            actions.push(record);
        }

        let (metric_keys, metrics) = parse_metrics_csv(&read_text(&dir.join(METRICS_FILE))?)?;

        let hashes = ContentHashes {
            config: digest(canonical_value(config.clone()).as_bytes()),
            actions: digest(canonical_actions.as_bytes()),
            metrics: digest(metrics_csv(&metric_keys, &metrics).as_bytes()),
        };

        Ok(Self {
            dir: Some(dir.to_path_buf()),
            summary,
            config,
            actions,
            metric_keys,
            metrics,
            hashes,
        })
    }

    /// True if the hashes recorded in `summary.json` match the content.
    pub fn verify(&self) -> bool {
        self.summary.hashes == self.hashes
    }
}

fn read_text(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses `metrics.csv` back into keys and samples.
pub fn parse_metrics_csv(text: &str) -> Result<(Vec<String>, Vec<MetricsSample>), ArtifactError> {
    let mut lines = text.lines();
    let header = lines.next().ok_or(ArtifactError::Csv {
        line: 1,
        reason: "missing header".to_string(),
    })?;
    let columns: Vec<&str> = header.split(',').collect();
    if columns.len() < 2 || columns[0] != "tick" || columns[1] != "timestamp" {
        return Err(ArtifactError::Csv {
            line: 1,
            reason: format!("header must start with tick,timestamp, got '{}'", header),
        });
    }
    let keys: Vec<String> = columns[2..].iter().map(|s| s.to_string()).collect();

    let mut samples = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 2;
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != columns.len() {
            return Err(ArtifactError::Csv {
                line: line_no,
                reason: format!("expected {} cells, got {}", columns.len(), cells.len()),
            });
        }
        let parse_u64 = |cell: &str| {
            cell.parse::<u64>().map_err(|e| ArtifactError::Csv {
                line: line_no,
                reason: format!("'{}': {}", cell, e),
            })
        };
        let tick = parse_u64(cells[0])?;
        let timestamp = parse_u64(cells[1])?;

        let mut values = BTreeMap::new();
        for (key, cell) in keys.iter().zip(&cells[2..]) {
            if cell.is_empty() {
                continue;
            }
            let v = cell.parse::<f64>().map_err(|e| ArtifactError::Csv {
                line: line_no,
                reason: format!("'{}': {}", cell, e),
            })?;
            values.insert(key.clone(), v);
        }
        samples.push(MetricsSample {
            tick,
            timestamp,
            values,
        });
    }
    Ok((keys, samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_metrics_csv_round_trip() {
        let text = "tick,timestamp,volume,price\n0,0,1000,1.25\n10,120,,2\n";
        let (keys, samples) = parse_metrics_csv(text).unwrap();
        assert_eq!(keys, vec!["volume", "price"]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].values.get("volume"), Some(&1000.0));
        assert!(!samples[1].values.contains_key("volume"));
        assert_eq!(metrics_csv(&keys, &samples), text);
    }

    #[test]
    fn test_parse_metrics_csv_rejects_bad_header() {
        assert!(matches!(
            parse_metrics_csv("time,volume\n"),
            Err(ArtifactError::Csv { line: 1, .. })
        ));
        assert!(parse_metrics_csv("").is_err());
    }

    #[test]
    fn test_parse_metrics_csv_rejects_ragged_rows() {
        let err = parse_metrics_csv("tick,timestamp,a\n0,0\n").unwrap_err();
        assert!(matches!(err, ArtifactError::Csv { line: 2, .. }));
    }

    #[test]
    fn test_load_recomputes_hashes_and_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let summary = json!({
            "scenario": "s", "seed": 1, "pack": "token", "status": "completed",
            "success": true, "ticks_requested": 1, "ticks_executed": 1,
            "seconds_per_tick": 12, "duration_ms": 0, "final_metrics": {"volume": 2.0},
            "failed_assertions": [], "agent_stats": {},
            "hashes": {"config": "", "actions": "", "metrics": ""}
        });
        let action = concat!(
            r#"{"tick":0,"timestamp":0,"agent_id":"idle-0","agent_type":"idle","#,
            r#""outcome":{"status":"agent_error","reason":"boom"}}"#
        );
        let write = |name: &str, text: &str| fs::write(dir.path().join(name), text).unwrap();
        write(SUMMARY_FILE, &summary.to_string());
        write(CONFIG_FILE, r#"{"seed": 1, "name": "s"}"#);
        write(ACTIONS_FILE, &format!("{}\n", action));
        write(METRICS_FILE, "tick,timestamp,volume\n0,0,2\n");

        let set = ArtifactSet::load(dir.path()).unwrap();
        assert_eq!(set.actions.len(), 1);
        assert_eq!(set.hashes.config, digest(br#"{"name":"s","seed":1}"#));
        assert_eq!(set.hashes.metrics, digest(b"tick,timestamp,volume\n0,0,2\n"));
        assert!(!set.verify());

        write(METRICS_FILE, "tick,timestamp,volume\n0,0,3\n");
        let tampered = ArtifactSet::load(dir.path()).unwrap();
        assert_ne!(tampered.hashes.metrics, set.hashes.metrics);
        assert_eq!(tampered.hashes.actions, set.hashes.actions);
    }

    #[test]
    fn test_reloaded_floats_keep_action_digest() {
        use crate::record::Outcome;
        use agora_env::{Action, ActionId, ActionResult, AgentId, SimRng};
        use std::time::Duration;

        let mut rng = SimRng::new(42);
        let records: Vec<RecordedAction> = (0..2_000u64)
            .map(|tick| {
                let amount = rng.next_float() * 1_000.0;
                let out = amount * (1.0 - 0.003) / (1.0 + rng.next_float());
                let action = Action::new(ActionId::from_parts(tick, 0, 0), "swap")
                    .with_param("side", "buy")
                    .with_param("amount_in", amount)
                    .with_param("min_out", 0.0);
                RecordedAction {
                    tick,
                    timestamp: tick * 12,
                    agent_id: AgentId::from("random_trader-0"),
                    agent_type: "random_trader".into(),
                    action: Some(action),
                    outcome: Outcome::Applied(ActionResult::ok_with(json!({ "amount_out": out }))),
                    duration: Duration::ZERO,
                }
            })
            .collect();
        let ndjson = canonical_ndjson(&records).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, text: &str| fs::write(dir.path().join(name), text).unwrap();
        write(SUMMARY_FILE, &minimal_summary().to_string());
        write(CONFIG_FILE, r#"{"fee": 0.003, "seed": 42}"#);
        write(ACTIONS_FILE, &ndjson);
        write(METRICS_FILE, "tick,timestamp\n");

        let set = ArtifactSet::load(dir.path()).unwrap();
        assert_eq!(set.hashes.actions, digest(ndjson.as_bytes()));
        assert_eq!(set.actions, records);
    }

    fn minimal_summary() -> Value {
        json!({
            "scenario": "s", "seed": 42, "pack": "token", "status": "completed",
            "success": true, "ticks_requested": 1, "ticks_executed": 1,
            "seconds_per_tick": 12, "duration_ms": 0, "final_metrics": {},
            "failed_assertions": [], "agent_stats": {},
            "hashes": {"config": "", "actions": "", "metrics": ""}
        })
    }

    #[test]
    fn test_load_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactSet::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }

    #[test]
    fn test_run_status_names() {
        assert_eq!(RunStatus::TimedOut.to_string(), "timed_out");
        assert_eq!(
            serde_json::to_string(&RunStatus::AssertionsFailed).unwrap(),
            "\"assertions_failed\""
        );
    }
}
