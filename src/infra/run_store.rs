// ============================================================
// Layer 6 — Run Store
// ============================================================
// Every `train` invocation gets its own numbered directory:
//
//   <runs_dir>/
//     1/
//       config.json    resolved TrainConfig
//       metrics.csv    step,name,value  (append-only)
//       run.json       id, status, start/stop time, artifacts
//       artifacts/
//         weights.mpk
//     2/
//       ...
//
// Ids are one more than the largest numeric directory already
// present, starting at 1.
//
// RunStore is both sinks the training loop reports into:
//   MetricSink   → a row in metrics.csv
//   ArtifactSink → a copy under artifacts/ plus a run.json entry

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::domain::metric::MetricRecord;
use crate::domain::traits::{ArtifactSink, MetricSink};
use crate::infra::checkpoint::CheckpointManager;

pub const METRICS_FILE:  &str = "metrics.csv";
pub const MANIFEST_FILE: &str = "run.json";
pub const ARTIFACTS_DIR: &str = "artifacts";

const METRICS_HEADER: &str = "step,name,value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub name: String,
    /// Relative to the run directory.
    pub path: PathBuf,
}

/// Contents of `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id:         u64,
    pub status:     RunStatus,
    pub start_time: DateTime<Utc>,
    pub stop_time:  Option<DateTime<Utc>>,
    pub fail_reason: Option<String>,
    pub artifacts:  Vec<ArtifactEntry>,
}

impl RunManifest {
    pub fn load(run_dir: &Path) -> Result<Self> {
        let path = run_dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Malformed '{}'", path.display()))
    }

    fn save(&self, run_dir: &Path) -> Result<()> {
        let path = run_dir.join(MANIFEST_FILE);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write '{}'", tmp.display()))?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactEntry> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}

pub struct RunStore {
    dir:       PathBuf,
    manifest:  RunManifest,
    metrics:   File,
    last_step: HashMap<String, usize>,
}

impl RunStore {
    /// Allocate the next run directory under `runs_dir` and record
    /// `cfg` in it.
    pub fn create(runs_dir: &Path, cfg: &TrainConfig) -> Result<Self> {
        fs::create_dir_all(runs_dir)
            .with_context(|| format!("Cannot create runs directory '{}'", runs_dir.display()))?;

        let id = next_run_id(runs_dir)?;
        let dir = Self::run_dir(runs_dir, id);
        fs::create_dir_all(dir.join(ARTIFACTS_DIR))
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;

        CheckpointManager::new(&dir).save_config(cfg)?;

        let metrics_path = dir.join(METRICS_FILE);
        let mut metrics = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&metrics_path)
            .with_context(|| format!("Cannot open '{}'", metrics_path.display()))?;
        writeln!(metrics, "{METRICS_HEADER}")?;

        let manifest = RunManifest {
            id,
            status:      RunStatus::Running,
            start_time:  Utc::now(),
            stop_time:   None,
            fail_reason: None,
            artifacts:   Vec::new(),
        };
        manifest.save(&dir)?;

        tracing::info!("Run {} started in '{}'", id, dir.display());
        Ok(Self { dir, manifest, metrics, last_step: HashMap::new() })
    }

    pub fn run_dir(runs_dir: &Path, id: u64) -> PathBuf {
        runs_dir.join(id.to_string())
    }

    pub fn id(&self) -> u64 {
        self.manifest.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn complete(&mut self) -> Result<()> {
        self.finish(RunStatus::Completed, None)
    }

    pub fn fail(&mut self, reason: &str) -> Result<()> {
        self.finish(RunStatus::Failed, Some(reason.to_string()))
    }

    fn finish(&mut self, status: RunStatus, reason: Option<String>) -> Result<()> {
        self.metrics.flush()?;
        self.manifest.status = status;
        self.manifest.stop_time = Some(Utc::now());
        self.manifest.fail_reason = reason;
        self.manifest.save(&self.dir)?;
        tracing::info!("Run {} {:?}", self.manifest.id, status);
        Ok(())
    }
}

impl MetricSink for RunStore {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> Result<()> {
        if let Some(&last) = self.last_step.get(name) {
            if step < last {
                bail!("metric '{name}' logged at step {step} after step {last}");
            }
        }
        self.last_step.insert(name.to_string(), step);
        writeln!(self.metrics, "{}", MetricRecord::new(name, value, step).to_csv_row())
            .with_context(|| format!("Cannot append to '{}'", self.dir.join(METRICS_FILE).display()))
    }
}

impl ArtifactSink for RunStore {
    fn add_artifact(&mut self, file: &Path, name: &str) -> Result<PathBuf> {
        let mut relative = Path::new(ARTIFACTS_DIR).join(name);
        if let Some(ext) = file.extension() {
            relative.set_extension(ext);
        }
        let target = self.dir.join(&relative);
        fs::copy(file, &target).with_context(|| {
            format!("Cannot copy artifact '{}' to '{}'", file.display(), target.display())
        })?;

        self.manifest.artifacts.retain(|a| a.name != name);
        self.manifest.artifacts.push(ArtifactEntry { name: name.to_string(), path: relative });
        self.manifest.save(&self.dir)?;

        tracing::info!("Artifact '{}' stored at '{}'", name, target.display());
        Ok(target)
    }
}

/// Parse a run's `metrics.csv`, skipping the header.
pub fn read_metrics(run_dir: &Path) -> Result<Vec<MetricRecord>> {
    let path = run_dir.join(METRICS_FILE);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    text.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            MetricRecord::from_csv_row(line)
                .with_context(|| format!("Malformed metric row '{line}' in '{}'", path.display()))
        })
        .collect()
}

fn next_run_id(runs_dir: &Path) -> Result<u64> {
    let mut max = 0;
    for entry in fs::read_dir(runs_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
            max = max.max(id);
        }
    }
    Ok(max + 1)
}
