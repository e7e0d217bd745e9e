// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Validate the resolved config      (Layer 3 - domain)
//   Step 2: Open a run directory              (Layer 6 - infra)
//   Step 3: Load train / test subsets         (Layer 4 - data)
//   Step 4: Pick the backend for the device   (Layer 2)
//   Step 5: Run the training loop             (Layer 5 - ml)
//   Step 6: Save weights, register artifact   (Layer 6 - infra)
//   Step 7: Mark the run completed or failed  (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use std::{fs, path::PathBuf};

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    provider::{DatasetKind, DatasetProvider},
    synthetic::SyntheticSpec,
};
use crate::domain::{error::ConfigError, sample::Subset, traits::ArtifactSink};
use crate::infra::{checkpoint::CheckpointManager, run_store::RunStore};
use crate::ml::{
    layers::ConvOrder,
    model::WideResNetConfig,
    objective::{LossKind, OptimizerKind},
    pooling::PoolingKind,
    trainer::run_training,
};

pub type WgpuBackend = Autodiff<Wgpu>;
pub type CpuBackend  = Autodiff<NdArray>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DeviceKind {
    Wgpu,
    Cpu,
}

impl Default for DeviceKind {
    fn default() -> Self {
        DeviceKind::Wgpu
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Every option of a run. `Default` is the baseline experiment;
// a JSON file may set any subset of the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub n_classes:         usize,
    pub depth:             usize,
    pub layers_per_stage:  Option<usize>,
    pub widen_factor:      usize,
    pub drop_rate:         f64,
    pub batch_size:        usize,
    pub conv_order:        ConvOrder,
    pub pooling:           PoolingKind,
    pub pooling_output:    [usize; 2],
    pub append_logsoftmax: bool,
    pub dataset:           DatasetKind,
    pub data_root:         PathBuf,
    pub synthetic:         SyntheticSpec,
    pub n_epochs:          usize,
    pub optimizer:         OptimizerKind,
    pub loss:              LossKind,
    pub log_norms:         bool,
    pub log_gradnorms:     bool,
    pub num_workers:       usize,
    pub device:            DeviceKind,
    pub seed:              u64,
    pub runs_dir:          PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_classes:         200,
            depth:             16,
            layers_per_stage:  None,
            widen_factor:      4,
            drop_rate:         0.02,
            batch_size:        100,
            conv_order:        ConvOrder::ConvBnRelu,
            pooling:           PoolingKind::AdaptiveMax,
            pooling_output:    [20, 20],
            append_logsoftmax: true,
            dataset:           DatasetKind::TinyImageNet,
            data_root:         PathBuf::from("data"),
            synthetic:         SyntheticSpec::default(),
            n_epochs:          10,
            optimizer:         OptimizerKind::default(),
            loss:              LossKind::CrossEntropy,
            log_norms:         false,
            log_gradnorms:     false,
            num_workers:       1,
            device:            DeviceKind::Wgpu,
            seed:              42,
            runs_dir:          PathBuf::from("f_runs"),
        }
    }
}

impl TrainConfig {
    /// The network part of the configuration.
    pub fn network(&self) -> WideResNetConfig {
        WideResNetConfig::new(self.n_classes)
            .with_depth(self.depth)
            .with_layers_per_stage(self.layers_per_stage)
            .with_widen_factor(self.widen_factor)
            .with_drop_rate(self.drop_rate)
            .with_conv_order(self.conv_order)
            .with_pooling(self.pooling)
            .with_pooling_output(self.pooling_output)
            .with_append_logsoftmax(self.append_logsoftmax)
    }

    pub fn provider(&self) -> DatasetProvider {
        DatasetProvider {
            kind:      self.dataset,
            data_root: self.data_root.clone(),
            synthetic: self.synthetic,
            seed:      self.seed,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        self.network().validate().map(|_| ())
    }
}

// ─── Presets ─────────────────────────────────────────────────────────────────
// Named bundles of overrides. Each one touches only its own field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Preset {
    UseSgd,
    Cifar10,
    Cifar100,
}

impl Preset {
    pub fn apply(self, cfg: &mut TrainConfig) {
        match self {
            Preset::UseSgd   => cfg.optimizer = OptimizerKind::nesterov_sgd(),
            Preset::Cifar10  => cfg.dataset = DatasetKind::Cifar10,
            Preset::Cifar100 => cfg.dataset = DatasetKind::Cifar100,
        }
    }
}

/// What a completed run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id:        u64,
    pub run_dir:       PathBuf,
    pub weights:       PathBuf,
    pub steps:         usize,
    pub train_loss:    f64,
    pub test_accuracy: f64,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<RunSummary> {
        let cfg = &self.config;

        // ── Step 1: Validate before touching the disk ─────────────────────────
        cfg.validate()?;

        // ── Step 2: Run directory with config.json ────────────────────────────
        let mut store = RunStore::create(&cfg.runs_dir, cfg)?;

        // ── Steps 3-6 ─────────────────────────────────────────────────────────
        let result = match cfg.device {
            DeviceKind::Wgpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                train_on::<WgpuBackend>(cfg, &mut store, &device)
            }
            DeviceKind::Cpu => {
                let device = NdArrayDevice::Cpu;
                tracing::info!("Using CPU device: {:?}", device);
                train_on::<CpuBackend>(cfg, &mut store, &device)
            }
        };

        // ── Step 7: Final status in run.json ──────────────────────────────────
        finish_run(&mut store, result)
    }
}

/// Record the outcome in run.json. A training error is returned
/// as-is even when marking the run failed also goes wrong.
fn finish_run(store: &mut RunStore, result: Result<RunSummary>) -> Result<RunSummary> {
    match result {
        Ok(summary) => {
            store.complete()?;
            Ok(summary)
        }
        Err(err) => {
            if let Err(mark_err) = store.fail(&format!("{err:#}")) {
                tracing::warn!("Could not mark run {} failed: {:#}", store.id(), mark_err);
            }
            Err(err)
        }
    }
}

fn train_on<B: AutodiffBackend>(
    cfg:    &TrainConfig,
    store:  &mut RunStore,
    device: &B::Device,
) -> Result<RunSummary> {
    let provider = cfg.provider();
    tracing::info!("Loading {:?} from '{}'", cfg.dataset, cfg.data_root.display());
    let train_dataset = provider.load(Subset::Train)?;
    let test_dataset  = provider.load(Subset::Test)?;

    let outcome = run_training::<B>(cfg, train_dataset, test_dataset, &mut *store, device)?;

    let tmp = CheckpointManager::new(store.dir()).save_weights(&outcome.model, "tmp_weights")?;
    let weights = store.add_artifact(&tmp, "weights")?;
    fs::remove_file(&tmp)?;

    Ok(RunSummary {
        run_id:        store.id(),
        run_dir:       store.dir().to_path_buf(),
        weights,
        steps:         outcome.steps,
        train_loss:    outcome.train_loss,
        test_accuracy: outcome.test_accuracy,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::run_store::{read_metrics, RunManifest, RunStatus};

    #[test]
    fn test_defaults_match_baseline_experiment() {
        let cfg = TrainConfig::default();
        assert_eq!((cfg.n_classes, cfg.depth, cfg.widen_factor), (200, 16, 4));
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.n_epochs, 10);
        assert_eq!(cfg.optimizer, OptimizerKind::Adam { lr: 0.001, betas: [0.6, 0.999] });
        assert_eq!(cfg.pooling_output, [20, 20]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_use_sgd_changes_only_the_optimizer() {
        let mut cfg = TrainConfig::default();
        Preset::UseSgd.apply(&mut cfg);
        assert_eq!(cfg.optimizer, OptimizerKind::Sgd { lr: 0.003, momentum: 0.9, nesterov: true });
        assert_eq!(TrainConfig { optimizer: OptimizerKind::default(), ..cfg }, TrainConfig::default());
    }

    #[test]
    fn test_cifar10_changes_only_the_dataset() {
        let mut cfg = TrainConfig::default();
        Preset::Cifar10.apply(&mut cfg);
        assert_eq!(cfg.dataset, DatasetKind::Cifar10);
        assert_eq!(cfg.n_classes, 200);
        assert_eq!(TrainConfig { dataset: DatasetKind::TinyImageNet, ..cfg }, TrainConfig::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: TrainConfig =
            serde_json::from_str(r#"{ "depth": 22, "dataset": "cifar100", "device": "cpu" }"#).unwrap();
        assert_eq!(cfg.depth, 22);
        assert_eq!(cfg.dataset, DatasetKind::Cifar100);
        assert_eq!(cfg.device, DeviceKind::Cpu);
        assert_eq!(cfg.widen_factor, 4);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let cfg = TrainConfig { batch_size: 0, ..TrainConfig::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroBatchSize));
        let cfg = TrainConfig { depth: 15, ..TrainConfig::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidDepth { depth: 15 }));
    }

    #[test]
    fn test_invalid_config_creates_no_run() {
        let root = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { depth: 11, runs_dir: root.path().join("runs"), ..TrainConfig::default() };
        assert!(TrainUseCase::new(cfg).execute().is_err());
        assert!(!root.path().join("runs").exists());
    }

    #[test]
    fn test_smoke_run_writes_weights_artifact() {
        let root = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            n_classes:      4,
            pooling_output: [4, 4],
            n_epochs:       1,
            dataset:        DatasetKind::Synthetic,
            synthetic:      SyntheticSpec { n_classes: 4, n_samples: 8, image_size: 8, train_fraction: 0.75 },
            device:         DeviceKind::Cpu,
            seed:           3,
            runs_dir:       root.path().join("runs"),
            ..TrainConfig::default()
        };

        let summary = TrainUseCase::new(cfg).execute().unwrap();
        assert_eq!(summary.run_id, 1);
        assert_eq!(summary.steps, 1);
        assert!(summary.weights.exists());
        assert!(!summary.run_dir.join("tmp_weights.mpk").exists());

        let manifest = RunManifest::load(&summary.run_dir).unwrap();
        assert_eq!(manifest.status, RunStatus::Completed);
        assert!(manifest.artifact("weights").is_some());

        let names: Vec<String> = read_metrics(&summary.run_dir).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["batch.loss", "batch.accuracy", "train.loss", "test.accuracy"]);
    }

    #[test]
    fn test_training_error_survives_unwritable_manifest() {
        let root = tempfile::tempdir().unwrap();
        let mut store = RunStore::create(root.path(), &TrainConfig::default()).unwrap();
        fs::remove_dir_all(store.dir()).unwrap();

        let err = finish_run(&mut store, Err(anyhow::anyhow!("loss became NaN"))).unwrap_err();
        assert_eq!(err.to_string(), "loss became NaN");
    }

    #[test]
    fn test_missing_dataset_marks_run_failed() {
        let root = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            dataset:   DatasetKind::Cifar10,
            data_root: root.path().join("no-data"),
            device:    DeviceKind::Cpu,
            runs_dir:  root.path().join("runs"),
            ..TrainConfig::default()
        };
        assert!(TrainUseCase::new(cfg).execute().is_err());
        let manifest = RunManifest::load(&root.path().join("runs").join("1")).unwrap();
        assert_eq!(manifest.status, RunStatus::Failed);
    }
}
