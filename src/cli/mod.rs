// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with `clap` and routes each
// subcommand to its use case in Layer 2:
//
//   1. `train`        — one training run into a new run directory
//   2. `evaluate`     — accuracy of a stored run's weights
//   3. `print-config` — the resolved configuration, as JSON
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConfigArgs, EvaluateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "wrn-trainer",
    version = "0.1.0",
    about = "Train and evaluate a Wide-ResNet classifier on TinyImageNet / CIFAR."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)       => run_train(args),
            Commands::Evaluate(args)    => run_evaluate(args),
            Commands::PrintConfig(args) => run_print_config(args),
        }
    }
}

fn run_train(args: ConfigArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let cfg = args.resolve()?;
    tracing::info!("Resolved configuration: {:?}", cfg);

    let summary = TrainUseCase::new(cfg).execute()?;

    println!("Run {} finished in '{}'", summary.run_id, summary.run_dir.display());
    println!("  steps:         {}", summary.steps);
    println!("  train.loss:    {:.6}", summary.train_loss);
    println!("  test.accuracy: {:.6}", summary.test_accuracy);
    println!("  weights:       {}", summary.weights.display());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let mut use_case = EvaluateUseCase::new(&args.runs_dir, args.run, args.subset);
    if let Some(device) = args.device {
        use_case = use_case.with_device(device);
    }
    let accuracy = use_case.execute()?;
    println!("{}.accuracy: {:.6}", args.subset, accuracy);
    Ok(())
}

fn run_print_config(args: ConfigArgs) -> Result<()> {
    let cfg = args.resolve()?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}
