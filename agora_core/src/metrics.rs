//! Periodic metric sampling.
//!
//! Tick 0 is always sampled, then every `sample_every_ticks` ticks. The
//! engine also asks for a closing sample on the last executed tick so the
//! final snapshot reflects the end state of the run.

use agora_env::MetricSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which metrics to track and how often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Sampling cadence in ticks (must be >= 1)
    #[serde(default = "default_sample_every")]
    pub sample_every_ticks: u64,

    /// Metric keys, in CSV column order
    #[serde(default)]
    pub track: Vec<String>,
}

fn default_sample_every() -> u64 {
    1
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_every_ticks: default_sample_every(),
            track: Vec::new(),
        }
    }
}

/// Metric values observed at one tick. Unknown keys are simply absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub tick: u64,
    pub timestamp: u64,
    pub values: BTreeMap<String, f64>,
}

/// Append-only time series of samples.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    config: MetricsConfig,
    samples: Vec<MetricsSample>,
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Tracked keys in column order.
    pub fn keys(&self) -> &[String] {
        &self.config.track
    }

    /// True if `tick` falls on the sampling cadence.
    pub fn is_due(&self, tick: u64) -> bool {
        tick == 0 || tick % self.config.sample_every_ticks.max(1) == 0
    }

    /// Samples unconditionally. A tick that was already sampled is skipped.
    pub fn sample(&mut self, tick: u64, timestamp: u64, source: &dyn MetricSource) {
        if self.samples.last().is_some_and(|s| s.tick == tick) {
            return;
        }
        let values = self
            .config
            .track
            .iter()
            .filter_map(|key| source.metric(key).map(|v| (key.clone(), v)))
            .collect();

        self.samples.push(MetricsSample {
            tick,
            timestamp,
            values,
        });
    }

    /// Samples if `tick` is on the cadence.
    pub fn maybe_sample(&mut self, tick: u64, timestamp: u64, source: &dyn MetricSource) -> bool {
        if self.is_due(tick) {
            self.sample(tick, timestamp, source);
            true
        } else {
            false
        }
    }

    pub fn samples(&self) -> &[MetricsSample] {
        &self.samples
    }

    /// Values of the last sample, empty if nothing was sampled.
    pub fn final_metrics(&self) -> BTreeMap<String, f64> {
        self.samples
            .last()
            .map(|s| s.values.clone())
            .unwrap_or_default()
    }

    pub fn into_samples(self) -> Vec<MetricsSample> {
        self.samples
    }
}
