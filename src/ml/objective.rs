// ============================================================
// Layer 5 — Optimiser and Loss Selection
// ============================================================
// The optimiser and the loss are chosen from closed sets:
//
//   OptimizerKind::Adam { lr, betas }           (default)
//   OptimizerKind::Sgd  { lr, momentum, nesterov }
//
//   LossKind::CrossEntropy                      (default)
//   LossKind::Nll   → mean negative log-likelihood; expects the
//                     log-softmax head
//
// Cross-entropy is safe on top of the log-softmax head: a
// second log-softmax over log-probabilities is the identity.

use burn::{
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OptimizerKind {
    Adam { lr: f64, betas: [f32; 2] },
    Sgd { lr: f64, momentum: f64, nesterov: bool },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::Adam { lr: 0.001, betas: [0.6, 0.999] }
    }
}

impl OptimizerKind {
    /// SGD with Nesterov momentum, as selected by the `use_sgd` preset.
    pub fn nesterov_sgd() -> Self {
        OptimizerKind::Sgd { lr: 0.003, momentum: 0.9, nesterov: true }
    }

    pub fn learning_rate(&self) -> f64 {
        match *self {
            OptimizerKind::Adam { lr, .. } | OptimizerKind::Sgd { lr, .. } => lr,
        }
    }

    pub fn with_learning_rate(self, lr: f64) -> Self {
        match self {
            OptimizerKind::Adam { betas, .. } => OptimizerKind::Adam { lr, betas },
            OptimizerKind::Sgd { momentum, nesterov, .. } => OptimizerKind::Sgd { lr, momentum, nesterov },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum LossKind {
    CrossEntropy,
    Nll,
}

impl Default for LossKind {
    fn default() -> Self {
        LossKind::CrossEntropy
    }
}

/// A loss function built once per run.
pub enum Criterion<B: Backend> {
    CrossEntropy(CrossEntropyLoss<B>),
    Nll,
}

impl<B: Backend> Criterion<B> {
    pub fn new(kind: LossKind, device: &B::Device) -> Self {
        match kind {
            LossKind::CrossEntropy => Criterion::CrossEntropy(CrossEntropyLossConfig::new().init(device)),
            LossKind::Nll          => Criterion::Nll,
        }
    }

    /// scores: [batch, n_classes], targets: [batch] → scalar loss [1]
    pub fn forward(&self, scores: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        match self {
            Criterion::CrossEntropy(ce) => ce.forward(scores, targets),
            Criterion::Nll => {
                let [batch, _] = scores.dims();
                scores.gather(1, targets.reshape([batch, 1])).mean().neg()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::activation::log_softmax};

    type TB = NdArray;

    #[test]
    fn test_nll_matches_cross_entropy_on_log_probs() {
        let device: <TB as Backend>::Device = Default::default();
        let logits = Tensor::<TB, 2>::from_floats([[2.0, 0.5, -1.0], [0.1, 0.2, 3.0]], &device);
        let targets = Tensor::<TB, 1, Int>::from_ints([0, 2], &device);
        let log_probs = log_softmax(logits.clone(), 1);

        let ce  = Criterion::<TB>::new(LossKind::CrossEntropy, &device)
            .forward(logits, targets.clone())
            .into_scalar()
            .elem::<f64>();
        let nll = Criterion::<TB>::new(LossKind::Nll, &device)
            .forward(log_probs, targets)
            .into_scalar()
            .elem::<f64>();
        assert!((ce - nll).abs() < 1e-5);
    }

    #[test]
    fn test_learning_rate_override_keeps_kind() {
        let sgd = OptimizerKind::nesterov_sgd().with_learning_rate(0.1);
        assert_eq!(sgd, OptimizerKind::Sgd { lr: 0.1, momentum: 0.9, nesterov: true });
        assert_eq!(OptimizerKind::default().learning_rate(), 0.001);
    }
}
