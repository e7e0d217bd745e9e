// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One training invocation, end to end:
//
//   build network → shape probe → re-initialise parameters
//   → optimiser + loss → n_epochs × (batches → test accuracy)
//
// Metric names and the step they are logged at:
//
//   batch.loss, batch.accuracy     every batch, at step `it`
//   gradnorm__<param>              every batch when log_gradnorms
//   norm__<param>                  every batch when log_norms
//   train.loss, test.accuracy      end of each epoch, at step `it`
//
// Key Burn insight:
//   - Training runs on an AutodiffBackend B
//   - model.valid() gives the same network on B::InnerBackend
//     with dropout off and batch-norm on running statistics;
//     the training model itself is never switched
//   - tensor.inner() detaches a value from the graph, so batch
//     accuracy is computed without touching the gradients
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Context, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{momentum::MomentumConfig, AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use tracing::{debug, info, warn};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::ImageBatch, dataset::ImageDataset, provider::build_loader};
use crate::domain::traits::MetricSink;
use crate::ml::evaluator::{count_correct, evaluate};
use crate::ml::model::WideResNet;
use crate::ml::objective::{Criterion, OptimizerKind};
use crate::ml::params::{NamedParameters, ResetParameters};

/// What a finished run hands back to its caller.
pub struct TrainOutcome<B: Backend> {
    pub model:            WideResNet<B>,
    /// Global step after the last batch.
    pub steps:            usize,
    pub first_batch_loss: Option<f64>,
    /// `train.loss` of the last epoch.
    pub train_loss:       f64,
    /// `test.accuracy` of the last epoch.
    pub test_accuracy:    f64,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    test_dataset:  ImageDataset,
    sink:          &mut dyn MetricSink,
    device:        &B::Device,
) -> Result<TrainOutcome<B>> {
    B::seed(cfg.seed);
    info!(
        "Train subset: {} images, test subset: {} images",
        train_dataset.sample_count(),
        test_dataset.sample_count()
    );

    let probe_dims = train_dataset
        .image_dims()
        .context("Training subset is empty")?;

    let train_loader = build_loader::<B>(
        train_dataset, device.clone(), cfg.batch_size, cfg.num_workers, Some(cfg.seed),
    );
    let test_loader = build_loader::<B::InnerBackend>(
        test_dataset, device.clone(), cfg.batch_size, cfg.num_workers, None,
    );

    // ── Build model ───────────────────────────────────────────────────────────
    let network = cfg.network();
    let model: WideResNet<B> = network.init(device)?;
    probe_output_shape(&model, probe_dims, cfg.n_classes, device)?;
    let model = model.reset_parameters();

    info!("Architecture: {:?}", network);
    info!(
        "Model ready: {} ResBlocks, widths {:?}, {} parameters",
        model.n_blocks(),
        network.channels(),
        model.num_params()
    );

    let criterion = Criterion::<B>::new(cfg.loss, device);

    // ── Optimiser ─────────────────────────────────────────────────────────────
    let lr = cfg.optimizer.learning_rate();
    info!("Entering train loop with {:?}", cfg.optimizer);
    match cfg.optimizer {
        OptimizerKind::Adam { betas, .. } => {
            // m = β1*m + (1-β1)*g        (mean)
            // v = β2*v + (1-β2)*g²       (variance)
            // θ = θ - lr * m / (√v + ε)  (update)
            let optim = AdamConfig::new()
                .with_beta_1(betas[0])
                .with_beta_2(betas[1])
                .with_epsilon(1e-8)
                .init::<B, WideResNet<B>>();
            fit(cfg, model, optim, lr, &criterion, train_loader.as_ref(), test_loader.as_ref(), sink)
        }
        OptimizerKind::Sgd { momentum, nesterov, .. } => {
            let momentum = MomentumConfig::new()
                .with_momentum(momentum)
                .with_dampening(0.0)
                .with_nesterov(nesterov);
            let optim = SgdConfig::new()
                .with_momentum(Some(momentum))
                .init::<B, WideResNet<B>>();
            fit(cfg, model, optim, lr, &criterion, train_loader.as_ref(), test_loader.as_ref(), sink)
        }
    }
}

/// One zero-filled image through the inference view; the head must
/// produce exactly one score per class.
fn probe_output_shape<B: AutodiffBackend>(
    model:     &WideResNet<B>,
    dims:      [usize; 3],
    n_classes: usize,
    device:    &B::Device,
) -> Result<()> {
    let [channels, height, width] = dims;
    ensure!(channels == 3, "Expected RGB images, found {channels} channels");

    let probe = Tensor::<B::InnerBackend, 4>::zeros([1, channels, height, width], device);
    let out = model.valid().forward(probe).dims();
    ensure!(
        out == [1, n_classes],
        "Network produced scores of shape {out:?} for a {height}x{width} image, expected [1, {n_classes}]"
    );
    debug!("Shape probe passed for {height}x{width} input");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn fit<B, O>(
    cfg:          &TrainConfig,
    mut model:    WideResNet<B>,
    mut optim:    O,
    lr:           f64,
    criterion:    &Criterion<B>,
    train_loader: &dyn DataLoader<ImageBatch<B>>,
    test_loader:  &dyn DataLoader<ImageBatch<B::InnerBackend>>,
    sink:         &mut dyn MetricSink,
) -> Result<TrainOutcome<B>>
where
    B: AutodiffBackend,
    O: Optimizer<WideResNet<B>, B>,
{
    let mut it = 0usize;
    let mut first_batch_loss = None;
    let mut train_loss = 0.0f64;
    let mut test_accuracy = 0.0f64;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 0..cfg.n_epochs {
        let mut total_loss = 0.0f64;

        for batch in train_loader.iter() {
            let batch_len = batch.len();
            let labels = batch.labels;

            let scores = model.forward(batch.images);
            let loss = criterion.forward(scores.clone(), labels.clone());
            let loss_value = loss.clone().into_scalar().elem::<f64>();
            if !loss_value.is_finite() {
                warn!("Non-finite loss {loss_value} at step {it}");
            }
            first_batch_loss.get_or_insert(loss_value);

            // Backward pass; gradients are rebuilt for every step
            let grads = loss.backward();
            if cfg.log_gradnorms {
                for (name, param) in model.named_parameters() {
                    if let Some(norm) = param.grad_l2_norm(&grads) {
                        sink.log_scalar(&format!("gradnorm__{name}"), norm, it)?;
                    }
                }
            }
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            // Detached from the graph: nothing here reaches the optimiser
            let correct = count_correct(scores.inner(), labels.inner());
            let batch_accuracy = correct as f64 / batch_len as f64;

            total_loss += loss_value / batch_len as f64;
            sink.log_scalar("batch.loss", loss_value, it)?;
            sink.log_scalar("batch.accuracy", batch_accuracy, it)?;
            if cfg.log_norms {
                for (name, param) in model.named_parameters() {
                    sink.log_scalar(&format!("norm__{name}"), param.l2_norm(), it)?;
                }
            }
            debug!("step {it}: loss={loss_value:.5} batch.accuracy={batch_accuracy:.5}");
            it += 1;
        }

        sink.log_scalar("train.loss", total_loss, it)?;
        test_accuracy = evaluate(&model.valid(), test_loader);
        sink.log_scalar("test.accuracy", test_accuracy, it)?;
        train_loss = total_loss;

        info!(
            "Epoch {:>3}/{} | train.loss={:.6} | test.accuracy={:.2}% | step={}",
            epoch + 1, cfg.n_epochs, total_loss, test_accuracy * 100.0, it,
        );
    }

    info!("Training complete after {it} steps");
    Ok(TrainOutcome { model, steps: it, first_batch_loss, train_loss, test_accuracy })
}
