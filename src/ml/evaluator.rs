// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Top-1 accuracy of a model over a data loader. Runs on a
// plain (non-autodiff) backend, so no gradient graph is built
// and dropout / batch-norm behave in inference mode. Callers
// holding a training model pass `model.valid()`.

use burn::{data::dataloader::DataLoader, prelude::*};

use crate::data::batcher::ImageBatch;
use crate::ml::model::WideResNet;

/// Running count of exact matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accuracy {
    pub correct: usize,
    pub total:   usize,
}

impl Accuracy {
    pub fn add(&mut self, correct: usize, total: usize) {
        self.correct += correct;
        self.total   += total;
    }

    /// correct / total, or 0.0 for an empty count.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Number of rows whose argmax equals the label.
pub fn count_correct<B: Backend>(scores: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns [batch, 1]; flatten to [batch] before comparing
    let predictions = scores.argmax(1).flatten::<1>(0, 1);
    predictions
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

pub fn evaluate<B: Backend>(model: &WideResNet<B>, loader: &dyn DataLoader<ImageBatch<B>>) -> f64 {
    let mut acc = Accuracy::default();
    for batch in loader.iter() {
        let total = batch.len();
        let scores = model.forward(batch.images);
        acc.add(count_correct(scores, batch.labels), total);
    }
    if acc.total == 0 {
        tracing::warn!("Evaluation subset is empty; reporting accuracy 0");
    }
    acc.ratio()
}
