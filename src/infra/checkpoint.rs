// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Weights and configuration files of one run directory.
//
// What gets written:
//   1. <stem>.mpk   — every parameter of the network, keyed by
//                     its field path (NamedMpkFileRecorder,
//                     full precision)
//   2. config.json  — the resolved TrainConfig
//
// The weights alone cannot rebuild a network: the block count,
// widths and head size all come from the config, so loading
// always starts from config.json.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::PathBuf,
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::WideResNet;

pub const CONFIG_FILE: &str = "config.json";

/// Extension the recorder appends to every weights stem.
pub const WEIGHTS_EXTENSION: &str = "mpk";

type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `model` to `<dir>/<stem>.mpk` and return that path.
    pub fn save_weights<B: Backend>(&self, model: &WideResNet<B>, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join(stem);

        WeightsRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;

        let written = path.with_extension(WEIGHTS_EXTENSION);
        tracing::debug!("Saved weights: '{}'", written.display());
        Ok(written)
    }

    /// Load `<dir>/<stem>.mpk` into a network of the same architecture.
    pub fn load_weights<B: Backend>(
        &self,
        model:  WideResNet<B>,
        stem:   &str,
        device: &B::Device,
    ) -> Result<WideResNet<B>> {
        let path = self.dir.join(stem);
        let record = WeightsRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load weights '{}.{WEIGHTS_EXTENSION}'. Has this run finished training?",
                    path.display()
                )
            })?;
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<PathBuf> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(path)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::WideResNetConfig;
    use crate::ml::params::{NamedParameters, ResetParameters};
    use burn::backend::NdArray;

    type TB = NdArray;

    fn network() -> WideResNetConfig {
        WideResNetConfig::new(3).with_depth(10).with_widen_factor(1).with_pooling_output([2, 2])
    }

    #[test]
    fn test_weights_reload_into_fresh_network() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let device: <TB as Backend>::Device = Default::default();

        let trained = network().init::<TB>(&device).unwrap().reset_parameters();
        let path = manager.save_weights(&trained, "weights").unwrap();
        assert_eq!(path, dir.path().join("weights.mpk"));
        assert!(path.exists());

        let fresh = network().init::<TB>(&device).unwrap().reset_parameters();
        let loaded = manager.load_weights(fresh, "weights", &device).unwrap();

        let expected = trained.named_parameters();
        let actual = loaded.named_parameters();
        assert_eq!(expected.len(), actual.len());
        for ((name, want), (other, got)) in expected.iter().zip(&actual) {
            assert_eq!(name, other);
            assert_eq!(want.to_vec(), got.to_vec(), "{name}");
        }
    }

    #[test]
    fn test_missing_weights_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let device: <TB as Backend>::Device = Default::default();
        let model = network().init::<TB>(&device).unwrap();
        assert!(CheckpointManager::new(dir.path()).load_weights(model, "weights", &device).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let cfg = TrainConfig { depth: 22, n_epochs: 3, ..TrainConfig::default() };
        manager.save_config(&cfg).unwrap();
        assert_eq!(manager.load_config().unwrap(), cfg);
    }
}
