//! Artifact exporter.
//!
//! Writes a run's `ArtifactSet` to a directory. The NDJSON and CSV files
//! are written in their canonical form, so their digests can be checked
//! with nothing but `sha256sum`.

use agora_core::artifacts::{ACTIONS_FILE, CONFIG_FILE, METRICS_FILE, SUMMARY_FILE};
use agora_core::hash::{canonical_ndjson, metrics_csv, sort_keys};
use agora_core::ArtifactSet;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::error::{SimError, SimResult};

/// Writes run artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactsWriter {
    dir: PathBuf,
}

impl ArtifactsWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes all four files, creating the directory if needed.
    pub fn write(&self, set: &ArtifactSet) -> SimResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| SimError::io(&self.dir, e))?;

        self.write_file(SUMMARY_FILE, &pretty(&set.summary)?)?;
        self.write_file(CONFIG_FILE, &pretty(&set.config)?)?;
        self.write_file(ACTIONS_FILE, &canonical_ndjson(&set.actions)?)?;
        self.write_file(METRICS_FILE, &metrics_csv(&set.metric_keys, &set.metrics))?;

        info!(
            "Wrote {} actions and {} samples to {}",
            set.actions.len(),
            set.metrics.len(),
            self.dir.display()
        );
        Ok(())
    }

    fn write_file(&self, name: &str, content: &str) -> SimResult<()> {
        let path = self.dir.join(name);
        fs::write(&path, content).map_err(|e| SimError::io(&path, e))
    }
}

/// Pretty JSON with sorted keys and a trailing newline.
fn pretty<T: Serialize>(value: &T) -> SimResult<String> {
    let mut text = serde_json::to_string_pretty(&sort_keys(serde_json::to_value(value)?))?;
    text.push('\n');
    Ok(text)
}
