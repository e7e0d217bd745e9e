// ============================================================
// Layer 5 — Convolution Units
// ============================================================
// A ConvUnit is the primitive block the residual branches are
// built from. It wraps one Conv2d, one BatchNorm, one ReLU and
// an optional Dropout, applied in one of two orders:
//
//   post-activation (conv_bn_relu):  conv → [dropout] → bn(out) → relu
//   pre-activation  (bn_relu_conv):  bn(in) → relu → [dropout] → conv
//
// The dropout layer exists only when drop_rate > 0, so a unit
// built with drop_rate = 0 has no Dropout module at all.
//
// Reference: Zagoruyko & Komodakis (2016) Wide Residual Networks
//            He et al. (2016) Identity Mappings in Deep ResNets

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig,
        Dropout, DropoutConfig,
        PaddingConfig2d,
        Relu,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Which ordering a ConvUnit applies its layers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ConvOrder {
    /// conv → [dropout] → bn → relu
    ConvBnRelu,
    /// bn → relu → [dropout] → conv
    BnReluConv,
}

impl Default for ConvOrder {
    fn default() -> Self {
        ConvOrder::ConvBnRelu
    }
}

/// Construction parameters for one ConvUnit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvUnitSpec {
    pub in_features:  usize,
    pub out_features: usize,
    pub kernel_size:  usize,
    pub stride:       usize,
    pub drop_rate:    f64,
    pub padding:      usize,
}

impl ConvUnitSpec {
    /// `stride = 1`, `drop_rate = 0`, `padding = 1`.
    pub fn new(in_features: usize, out_features: usize, kernel_size: usize) -> Self {
        Self { in_features, out_features, kernel_size, stride: 1, drop_rate: 0.0, padding: 1 }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_drop_rate(mut self, drop_rate: f64) -> Self {
        self.drop_rate = drop_rate;
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Spatial output size for an input of `size` pixels.
    pub fn output_size(&self, size: usize) -> usize {
        (size + 2 * self.padding - self.kernel_size) / self.stride + 1
    }
}

#[derive(Module, Debug)]
pub struct ConvUnit<B: Backend> {
    pub conv:    Conv2d<B>,
    pub norm:    BatchNorm<B, 2>,
    pub relu:    Relu,
    pub dropout: Option<Dropout>,
    /// true → bn → relu → [dropout] → conv
    pub pre_activation: bool,
}

impl<B: Backend> ConvUnit<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.pre_activation {
            let x = self.relu.forward(self.norm.forward(x));
            let x = self.drop(x);
            self.conv.forward(x)
        } else {
            let x = self.drop(self.conv.forward(x));
            self.relu.forward(self.norm.forward(x))
        }
    }

    fn drop(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None          => x,
        }
    }
}

fn conv<B: Backend>(spec: &ConvUnitSpec, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(
        [spec.in_features, spec.out_features],
        [spec.kernel_size, spec.kernel_size],
    )
    .with_stride([spec.stride, spec.stride])
    .with_padding(PaddingConfig2d::Explicit(spec.padding, spec.padding))
    .init(device)
}

fn dropout(drop_rate: f64) -> Option<Dropout> {
    (drop_rate > 0.0).then(|| DropoutConfig::new(drop_rate).init())
}

/// conv → [dropout] → bn(out) → relu
pub fn conv_bn_relu<B: Backend>(spec: ConvUnitSpec, device: &B::Device) -> ConvUnit<B> {
    ConvUnit {
        conv:    conv(&spec, device),
        norm:    BatchNormConfig::new(spec.out_features).init(device),
        relu:    Relu::new(),
        dropout: dropout(spec.drop_rate),
        pre_activation: false,
    }
}

/// bn(in) → relu → [dropout] → conv
pub fn bn_relu_conv<B: Backend>(spec: ConvUnitSpec, device: &B::Device) -> ConvUnit<B> {
    ConvUnit {
        conv:    conv(&spec, device),
        norm:    BatchNormConfig::new(spec.in_features).init(device),
        relu:    Relu::new(),
        dropout: dropout(spec.drop_rate),
        pre_activation: true,
    }
}

/// Build a unit in the configured order.
pub fn make_conv<B: Backend>(order: ConvOrder, spec: ConvUnitSpec, device: &B::Device) -> ConvUnit<B> {
    match order {
        ConvOrder::ConvBnRelu => conv_bn_relu(spec, device),
        ConvOrder::BnReluConv => bn_relu_conv(spec, device),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_dropout_only_when_rate_positive() {
        let device: <TB as Backend>::Device = Default::default();
        let with    = conv_bn_relu::<TB>(ConvUnitSpec::new(4, 8, 3).with_drop_rate(0.1), &device);
        let without = conv_bn_relu::<TB>(ConvUnitSpec::new(4, 8, 3), &device);
        assert!(with.dropout.is_some());
        assert!(without.dropout.is_none());
    }

    #[test]
    fn test_norm_width_follows_order() {
        let device: <TB as Backend>::Device = Default::default();
        let spec = ConvUnitSpec::new(4, 8, 3);
        let post = make_conv::<TB>(ConvOrder::ConvBnRelu, spec, &device);
        let pre  = make_conv::<TB>(ConvOrder::BnReluConv, spec, &device);
        // post-activation normalises the conv output, pre-activation its input
        assert_eq!(post.norm.gamma.val().dims(), [8]);
        assert_eq!(pre.norm.gamma.val().dims(), [4]);
        assert!(!post.pre_activation);
        assert!(pre.pre_activation);
    }

    #[test]
    fn test_output_shape_with_stride() {
        let device: <TB as Backend>::Device = Default::default();
        for order in [ConvOrder::ConvBnRelu, ConvOrder::BnReluConv] {
            let spec = ConvUnitSpec::new(3, 6, 3).with_stride(2);
            let unit = make_conv::<TB>(order, spec, &device);
            let x = Tensor::<TB, 4>::ones([2, 3, 9, 9], &device);
            let y = unit.forward(x);
            assert_eq!(y.dims(), [2, 6, spec.output_size(9), spec.output_size(9)]);
            assert_eq!(spec.output_size(9), 5);
        }
    }

    #[test]
    fn test_post_activation_output_is_non_negative() {
        let device: <TB as Backend>::Device = Default::default();
        let unit = conv_bn_relu::<TB>(ConvUnitSpec::new(3, 4, 1).with_padding(0), &device);
        let x = Tensor::<TB, 4>::random([2, 3, 5, 5], burn::tensor::Distribution::Normal(0.0, 1.0), &device);
        let min = unit.forward(x).min().into_scalar().elem::<f32>();
        assert!(min >= 0.0);
    }
}
