// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `train`, `evaluate` and `print-config`.
//
// `train` and `print-config` share ConfigArgs. The resolved
// TrainConfig is built in a fixed order:
//
//   defaults → --config <json> → --preset (in order) → flags
//
// Closed option sets (dataset, conv order, pooling, loss,
// device, preset) are clap ValueEnums named like their serde
// forms, so the CLI and the JSON config accept the same
// spellings, e.g. `--dataset cifar100 --conv-order bn_relu_conv`.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::application::train_use_case::{DeviceKind, Preset, TrainConfig};
use crate::data::provider::DatasetKind;
use crate::domain::sample::Subset;
use crate::ml::{layers::ConvOrder, objective::LossKind, pooling::PoolingKind};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a Wide-ResNet and store the run under --runs-dir
    Train(ConfigArgs),

    /// Accuracy of a stored run's weights on one subset
    Evaluate(EvaluateArgs),

    /// Print the resolved configuration as JSON and exit
    PrintConfig(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// JSON file with any subset of the configuration fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Named preset (repeatable)
    #[arg(long, value_enum)]
    pub preset: Vec<Preset>,

    #[arg(long)]
    pub n_classes: Option<usize>,

    /// Total depth; (depth - 4) must be divisible by 6
    #[arg(long)]
    pub depth: Option<usize>,

    /// Blocks per stage; overrides --depth
    #[arg(long)]
    pub layers_per_stage: Option<usize>,

    #[arg(long)]
    pub widen_factor: Option<usize>,

    #[arg(long)]
    pub drop_rate: Option<f64>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long, value_enum)]
    pub conv_order: Option<ConvOrder>,

    #[arg(long, value_enum)]
    pub pooling: Option<PoolingKind>,

    /// Pooled grid size fed to the classifier
    #[arg(long, num_args = 2, value_names = ["H", "W"])]
    pub pooling_output: Option<Vec<usize>>,

    /// Emit raw scores instead of log-probabilities
    #[arg(long)]
    pub no_logsoftmax: bool,

    #[arg(long, value_enum)]
    pub dataset: Option<DatasetKind>,

    /// Directory holding the dataset folders
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    #[arg(long)]
    pub n_epochs: Option<usize>,

    /// Learning rate of the selected optimizer
    #[arg(long)]
    pub lr: Option<f64>,

    #[arg(long, value_enum)]
    pub loss: Option<LossKind>,

    /// Log the L2 norm of every parameter after each step
    #[arg(long)]
    pub log_norms: bool,

    /// Log the L2 norm of every gradient after each step
    #[arg(long)]
    pub log_gradnorms: bool,

    #[arg(long)]
    pub num_workers: Option<usize>,

    #[arg(long, value_enum)]
    pub device: Option<DeviceKind>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Where run directories are created
    #[arg(long)]
    pub runs_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn resolve(self) -> Result<TrainConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Malformed config file '{}'", path.display()))?
            }
            None => TrainConfig::default(),
        };

        for preset in &self.preset {
            preset.apply(&mut cfg);
        }

        if let Some(v) = self.n_classes        { cfg.n_classes = v; }
        if let Some(v) = self.depth            { cfg.depth = v; }
        if let Some(v) = self.layers_per_stage { cfg.layers_per_stage = Some(v); }
        if let Some(v) = self.widen_factor     { cfg.widen_factor = v; }
        if let Some(v) = self.drop_rate        { cfg.drop_rate = v; }
        if let Some(v) = self.batch_size       { cfg.batch_size = v; }
        if let Some(v) = self.conv_order       { cfg.conv_order = v; }
        if let Some(v) = self.pooling          { cfg.pooling = v; }
        if let Some([h, w]) = self.pooling_output.as_deref() {
            cfg.pooling_output = [*h, *w];
        }
        if self.no_logsoftmax                  { cfg.append_logsoftmax = false; }
        if let Some(v) = self.dataset          { cfg.dataset = v; }
        if let Some(v) = self.data_root        { cfg.data_root = v; }
        if let Some(v) = self.n_epochs         { cfg.n_epochs = v; }
        if let Some(v) = self.lr               { cfg.optimizer = cfg.optimizer.with_learning_rate(v); }
        if let Some(v) = self.loss             { cfg.loss = v; }
        if self.log_norms                      { cfg.log_norms = true; }
        if self.log_gradnorms                  { cfg.log_gradnorms = true; }
        if let Some(v) = self.num_workers      { cfg.num_workers = v; }
        if let Some(v) = self.device           { cfg.device = v; }
        if let Some(v) = self.seed             { cfg.seed = v; }
        if let Some(v) = self.runs_dir         { cfg.runs_dir = v; }

        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Numeric id of the run directory
    #[arg(long)]
    pub run: u64,

    #[arg(long, default_value = "f_runs")]
    pub runs_dir: PathBuf,

    #[arg(long, default_value = "test", value_enum)]
    pub subset: Subset,

    /// Override the device recorded in the run's config
    #[arg(long, value_enum)]
    pub device: Option<DeviceKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::objective::OptimizerKind;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(subcommand)]
        command: Commands,
    }

    fn resolve(args: &[&str]) -> TrainConfig {
        let argv = std::iter::once("wrn-trainer").chain(args.iter().copied());
        match Harness::parse_from(argv).command {
            Commands::Train(a) | Commands::PrintConfig(a) => a.resolve().unwrap(),
            Commands::Evaluate(_) => panic!("not a config command"),
        }
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        assert_eq!(resolve(&["train"]), TrainConfig::default());
    }

    #[test]
    fn test_flags_override_presets() {
        let cfg = resolve(&["train", "--preset", "use_sgd", "--preset", "cifar100", "--lr", "0.1"]);
        assert_eq!(cfg.optimizer, OptimizerKind::Sgd { lr: 0.1, momentum: 0.9, nesterov: true });
        assert_eq!(cfg.dataset, DatasetKind::Cifar100);
    }

    #[test]
    fn test_enum_flags_use_config_names() {
        let cfg = resolve(&[
            "print-config",
            "--conv-order", "bn_relu_conv",
            "--pooling", "adaptive_avg",
            "--pooling-output", "8", "6",
            "--dataset", "tinyimagenet",
            "--device", "cpu",
            "--no-logsoftmax",
        ]);
        assert_eq!(cfg.conv_order, ConvOrder::BnReluConv);
        assert_eq!(cfg.pooling, PoolingKind::AdaptiveAvg);
        assert_eq!(cfg.pooling_output, [8, 6]);
        assert_eq!(cfg.dataset, DatasetKind::TinyImageNet);
        assert_eq!(cfg.device, DeviceKind::Cpu);
        assert!(!cfg.append_logsoftmax);
    }

    #[test]
    fn test_config_file_is_applied_before_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{ "depth": 22, "batch_size": 32 }"#).unwrap();
        let cfg = resolve(&["train", "--config", path.to_str().unwrap(), "--batch-size", "64"]);
        assert_eq!(cfg.depth, 22);
        assert_eq!(cfg.batch_size, 64);
    }

    fn serde_name<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_value(value).unwrap().as_str().unwrap().to_string()
    }

    fn assert_cli_matches_json<T: clap::ValueEnum + serde::Serialize>() {
        for variant in T::value_variants() {
            let cli = variant.to_possible_value().unwrap();
            assert_eq!(cli.get_name(), serde_name(variant));
        }
    }

    #[test]
    fn test_cli_names_match_config_names() {
        assert_cli_matches_json::<Preset>();
        assert_cli_matches_json::<ConvOrder>();
        assert_cli_matches_json::<PoolingKind>();
        assert_cli_matches_json::<DatasetKind>();
        assert_cli_matches_json::<LossKind>();
        assert_cli_matches_json::<DeviceKind>();
        assert_cli_matches_json::<Subset>();
    }

    #[test]
    fn test_evaluate_subset_defaults_to_test() {
        let argv = ["wrn-trainer", "evaluate", "--run", "3", "--subset", "train"];
        match Harness::parse_from(argv).command {
            Commands::Evaluate(a) => assert_eq!((a.run, a.subset), (3, Subset::Train)),
            _ => panic!("expected evaluate"),
        }
        match Harness::parse_from(["wrn-trainer", "evaluate", "--run", "3"]).command {
            Commands::Evaluate(a) => assert_eq!(a.subset, Subset::Test),
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        let argv = ["wrn-trainer", "train", "--preset", "imagenet"];
        assert!(Harness::try_parse_from(argv).is_err());
    }
}
