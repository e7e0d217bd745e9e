// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Re-scores a finished run:
//   1. Read <run>/config.json and rebuild the same network
//   2. Load the `weights` artifact listed in run.json
//   3. Load the requested subset of the run's dataset
//   4. Report top-1 accuracy
//
// Runs on a plain backend; no gradients are ever recorded.

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};

use crate::application::train_use_case::{DeviceKind, TrainConfig};
use crate::data::provider::build_loader;
use crate::domain::sample::Subset;
use crate::infra::{
    checkpoint::CheckpointManager,
    run_store::{RunManifest, RunStore},
};
use crate::ml::evaluator::evaluate;

pub struct EvaluateUseCase {
    run_dir: PathBuf,
    subset:  Subset,
    device:  Option<DeviceKind>,
}

impl EvaluateUseCase {
    pub fn new(runs_dir: impl Into<PathBuf>, run_id: u64, subset: Subset) -> Self {
        let runs_dir: PathBuf = runs_dir.into();
        Self {
            run_dir: RunStore::run_dir(&runs_dir, run_id),
            subset,
            device: None,
        }
    }

    /// Evaluate on a different device than the run was trained on.
    pub fn with_device(mut self, device: DeviceKind) -> Self {
        self.device = Some(device);
        self
    }

    pub fn execute(&self) -> Result<f64> {
        let cfg = CheckpointManager::new(&self.run_dir).load_config()?;
        match self.device.unwrap_or(cfg.device) {
            DeviceKind::Wgpu => self.evaluate_on::<Wgpu>(&cfg, &WgpuDevice::default()),
            DeviceKind::Cpu  => self.evaluate_on::<NdArray>(&cfg, &NdArrayDevice::Cpu),
        }
    }

    fn evaluate_on<B: Backend>(&self, cfg: &TrainConfig, device: &B::Device) -> Result<f64> {
        let manifest = RunManifest::load(&self.run_dir)?;
        let weights = manifest
            .artifact("weights")
            .with_context(|| format!("Run '{}' has no weights artifact", self.run_dir.display()))?;
        let weights_path = self.run_dir.join(&weights.path);
        let dir = weights_path.parent().unwrap_or(&self.run_dir);
        let stem = weights_path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Bad artifact path '{}'", weights_path.display()))?;

        let model = cfg.network().init::<B>(device)?;
        let model = CheckpointManager::new(dir).load_weights(model, stem, device)?;
        tracing::info!("Loaded weights from '{}'", weights_path.display());

        let dataset = cfg.provider().load(self.subset)?;
        tracing::info!("Evaluating on {} {} images", dataset.sample_count(), self.subset);
        let loader = build_loader::<B>(dataset, device.clone(), cfg.batch_size, cfg.num_workers, None);

        let accuracy = evaluate(&model, loader.as_ref());
        tracing::info!("{}.accuracy: {:.6}", self.subset, accuracy);
        Ok(accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::data::{provider::DatasetKind, synthetic::SyntheticSpec};

    #[test]
    fn test_evaluate_reproduces_final_test_accuracy() {
        let root = tempfile::tempdir().unwrap();
        let runs_dir = root.path().join("runs");
        let cfg = TrainConfig {
            n_classes:      3,
            depth:          10,
            widen_factor:   1,
            pooling_output: [3, 3],
            n_epochs:       1,
            batch_size:     4,
            dataset:        DatasetKind::Synthetic,
            synthetic:      SyntheticSpec { n_classes: 3, n_samples: 12, image_size: 8, train_fraction: 0.5 },
            device:         DeviceKind::Cpu,
            runs_dir:       runs_dir.clone(),
            ..TrainConfig::default()
        };
        let summary = TrainUseCase::new(cfg).execute().unwrap();

        let accuracy = EvaluateUseCase::new(&runs_dir, summary.run_id, Subset::Test).execute().unwrap();
        assert!((accuracy - summary.test_accuracy).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_run_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(EvaluateUseCase::new(root.path(), 7, Subset::Test).execute().is_err());
    }
}
