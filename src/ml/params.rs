// ============================================================
// Layer 5 — Named Parameters
// ============================================================
// Walks the trainable parameters of the network with a dotted
// path for each one, e.g.
//
//   stem.weight
//   blocks.3.residual.0.conv.weight
//   blocks.3.residual.0.norm.gamma
//   classifier.bias
//
// The walk serves two purposes:
//   - norm / gradient-norm logging under a stable metric name
//   - re-initialising every parameter after construction:
//       rank >= 2 → Xavier-uniform, bound sqrt(6 / (fan_in + fan_out))
//       rank 1    → uniform in ±1/sqrt(numel)
//
// Immersion kernels are constants, not parameters, so they are
// skipped by both.

use burn::{
    module::Param,
    nn::{conv::Conv2d, BatchNorm, Linear},
    prelude::*,
    tensor::{backend::AutodiffBackend, Distribution},
};

use crate::ml::layers::ConvUnit;
use crate::ml::model::{ResBlock, WideResNet};

/// A trainable tensor of any rank the network uses.
#[derive(Debug, Clone)]
pub enum ParamTensor<B: Backend> {
    Vector(Tensor<B, 1>),
    Matrix(Tensor<B, 2>),
    Kernel(Tensor<B, 4>),
}

impl<B: Backend> ParamTensor<B> {
    pub fn num_elements(&self) -> usize {
        match self {
            ParamTensor::Vector(t) => t.shape().num_elements(),
            ParamTensor::Matrix(t) => t.shape().num_elements(),
            ParamTensor::Kernel(t) => t.shape().num_elements(),
        }
    }

    pub fn l2_norm(&self) -> f64 {
        match self {
            ParamTensor::Vector(t) => l2(t.clone()),
            ParamTensor::Matrix(t) => l2(t.clone().flatten::<1>(0, 1)),
            ParamTensor::Kernel(t) => l2(t.clone().flatten::<1>(0, 3)),
        }
    }

    /// Flattened host copy of the values.
    pub fn to_vec(&self) -> Vec<f32> {
        let data = match self {
            ParamTensor::Vector(t) => t.to_data(),
            ParamTensor::Matrix(t) => t.to_data(),
            ParamTensor::Kernel(t) => t.to_data(),
        };
        data.convert::<f32>().to_vec::<f32>().unwrap_or_default()
    }
}

impl<B: AutodiffBackend> ParamTensor<B> {
    /// Norm of this parameter's gradient, if the backward pass reached it.
    pub fn grad_l2_norm(&self, grads: &B::Gradients) -> Option<f64> {
        match self {
            ParamTensor::Vector(t) => t.grad(grads).map(l2),
            ParamTensor::Matrix(t) => t.grad(grads).map(|g| l2(g.flatten::<1>(0, 1))),
            ParamTensor::Kernel(t) => t.grad(grads).map(|g| l2(g.flatten::<1>(0, 3))),
        }
    }
}

fn l2<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.powf_scalar(2.0).sum().sqrt().into_scalar().elem::<f64>()
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

// ─── Walking ─────────────────────────────────────────────────────────────────

/// Modules whose trainable parameters can be listed by name.
pub trait NamedParameters<B: Backend> {
    fn visit_named(&self, prefix: &str, visit: &mut dyn FnMut(String, ParamTensor<B>));

    fn named_parameters(&self) -> Vec<(String, ParamTensor<B>)> {
        let mut out = Vec::new();
        self.visit_named("", &mut |name, tensor| out.push((name, tensor)));
        out
    }
}

impl<B: Backend> NamedParameters<B> for Conv2d<B> {
    fn visit_named(&self, prefix: &str, visit: &mut dyn FnMut(String, ParamTensor<B>)) {
        visit(join(prefix, "weight"), ParamTensor::Kernel(self.weight.val()));
        if let Some(bias) = &self.bias {
            visit(join(prefix, "bias"), ParamTensor::Vector(bias.val()));
        }
    }
}

impl<B: Backend> NamedParameters<B> for BatchNorm<B, 2> {
    fn visit_named(&self, prefix: &str, visit: &mut dyn FnMut(String, ParamTensor<B>)) {
        visit(join(prefix, "gamma"), ParamTensor::Vector(self.gamma.val()));
        visit(join(prefix, "beta"), ParamTensor::Vector(self.beta.val()));
    }
}

impl<B: Backend> NamedParameters<B> for Linear<B> {
    fn visit_named(&self, prefix: &str, visit: &mut dyn FnMut(String, ParamTensor<B>)) {
        visit(join(prefix, "weight"), ParamTensor::Matrix(self.weight.val()));
        if let Some(bias) = &self.bias {
            visit(join(prefix, "bias"), ParamTensor::Vector(bias.val()));
        }
    }
}

impl<B: Backend> NamedParameters<B> for ConvUnit<B> {
    fn visit_named(&self, prefix: &str, visit: &mut dyn FnMut(String, ParamTensor<B>)) {
        self.conv.visit_named(&join(prefix, "conv"), visit);
        self.norm.visit_named(&join(prefix, "norm"), visit);
    }
}

impl<B: Backend> NamedParameters<B> for ResBlock<B> {
    fn visit_named(&self, prefix: &str, visit: &mut dyn FnMut(String, ParamTensor<B>)) {
        let residual = join(prefix, "residual");
        for (i, unit) in self.residual.iter().enumerate() {
            unit.visit_named(&join(&residual, &i.to_string()), visit);
        }
    }
}

impl<B: Backend> NamedParameters<B> for WideResNet<B> {
    fn visit_named(&self, prefix: &str, visit: &mut dyn FnMut(String, ParamTensor<B>)) {
        self.stem.visit_named(&join(prefix, "stem"), visit);
        let blocks = join(prefix, "blocks");
        for (i, block) in self.blocks.iter().enumerate() {
            block.visit_named(&join(&blocks, &i.to_string()), visit);
        }
        self.head_norm.visit_named(&join(prefix, "head_norm"), visit);
        self.head_conv.visit_named(&join(prefix, "head_conv"), visit);
        self.classifier.visit_named(&join(prefix, "classifier"), visit);
    }
}

// ─── Re-initialisation ───────────────────────────────────────────────────────

/// Half-width of the uniform range a parameter of `dims` is drawn from.
pub fn init_bound(dims: &[usize]) -> f64 {
    match dims {
        [] => 1.0,
        [n] => 1.0 / (*n as f64).sqrt(),
        [fan_a, fan_b, receptive @ ..] => {
            let receptive: usize = receptive.iter().product();
            (6.0 / ((fan_a + fan_b) * receptive) as f64).sqrt()
        }
    }
}

fn reset<B: Backend, const D: usize>(param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
    let value = param.val();
    let dims = value.dims();
    let bound = init_bound(&dims);
    let fresh = Tensor::<B, D>::random(dims, Distribution::Uniform(-bound, bound), &value.device());
    Param::from_tensor(fresh)
}

/// Modules whose parameters can be redrawn from the init scheme.
pub trait ResetParameters {
    fn reset_parameters(self) -> Self;
}

impl<B: Backend> ResetParameters for Conv2d<B> {
    fn reset_parameters(mut self) -> Self {
        self.weight = reset(self.weight);
        self.bias = self.bias.map(reset);
        self
    }
}

impl<B: Backend> ResetParameters for BatchNorm<B, 2> {
    fn reset_parameters(mut self) -> Self {
        self.gamma = reset(self.gamma);
        self.beta = reset(self.beta);
        self
    }
}

impl<B: Backend> ResetParameters for Linear<B> {
    fn reset_parameters(mut self) -> Self {
        self.weight = reset(self.weight);
        self.bias = self.bias.map(reset);
        self
    }
}

impl<B: Backend> ResetParameters for ConvUnit<B> {
    fn reset_parameters(mut self) -> Self {
        self.conv = self.conv.reset_parameters();
        self.norm = self.norm.reset_parameters();
        self
    }
}

impl<B: Backend> ResetParameters for ResBlock<B> {
    fn reset_parameters(mut self) -> Self {
        self.residual = self.residual.into_iter().map(ResetParameters::reset_parameters).collect();
        self
    }
}

impl<B: Backend> ResetParameters for WideResNet<B> {
    fn reset_parameters(mut self) -> Self {
        self.stem = self.stem.reset_parameters();
        self.blocks = self.blocks.into_iter().map(ResetParameters::reset_parameters).collect();
        self.head_norm = self.head_norm.reset_parameters();
        self.head_conv = self.head_conv.reset_parameters();
        self.classifier = self.classifier.reset_parameters();
        self
    }
}
