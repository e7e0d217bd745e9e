use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig,
        Linear, LinearConfig,
        Relu,
    },
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::domain::error::ConfigError;
use crate::ml::immersion::{Immersion, ImmersionConfig};
use crate::ml::layers::{make_conv, ConvOrder, ConvUnit, ConvUnitSpec};
use crate::ml::pooling::PoolingKind;

/// Base width of the stem, before widening.
pub const STEM_CHANNELS: usize = 16;

/// Stride of each of the three stages.
pub const STAGE_STRIDES: [usize; 3] = [1, 2, 3];

// ─── ResBlock ────────────────────────────────────────────────────────────────
// Block B(3,1) from Zagoruyko & Komodakis: a 3x3 unit that applies the
// stride followed by a 1x1 unit carrying the dropout, summed with an
// Immersion shortcut.

#[derive(Module, Debug)]
pub struct ResBlock<B: Backend> {
    pub residual: Vec<ConvUnit<B>>,
    pub shortcut: Immersion<B>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResBlockConfig {
    pub in_features:  usize,
    pub out_features: usize,
    pub stride:       usize,
    pub drop_rate:    f64,
    pub conv_order:   ConvOrder,
}

impl ResBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResBlock<B> {
        let first = ConvUnitSpec::new(self.in_features, self.out_features, 3)
            .with_stride(self.stride);
        let second = ConvUnitSpec::new(self.out_features, self.out_features, 1)
            .with_padding(0)
            .with_drop_rate(self.drop_rate);

        let residual = vec![
            make_conv(self.conv_order, first, device),
            make_conv(self.conv_order, second, device),
        ];
        let shortcut = ImmersionConfig::new(self.in_features, self.out_features, 1)
            .with_stride(self.stride)
            .init(device);

        ResBlock { residual, shortcut }
    }
}

impl<B: Backend> ResBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = self.shortcut.forward(input.clone());
        let residual = self.residual.iter().fold(input, |x, unit| unit.forward(x));
        assert_eq!(
            shortcut.dims(),
            residual.dims(),
            "shortcut and residual branch shapes disagree"
        );
        shortcut + residual
    }
}

// ─── WideResNet ──────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct WideResNetConfig {
    pub n_classes: usize,
    /// Total depth; must satisfy `(depth - 4) % 6 == 0`.
    #[config(default = 16)]
    pub depth: usize,
    /// Blocks per stage; takes precedence over `depth` when set.
    #[config(default = "None")]
    pub layers_per_stage: Option<usize>,
    #[config(default = 4)]
    pub widen_factor: usize,
    #[config(default = 0.02)]
    pub drop_rate: f64,
    #[config(default = "ConvOrder::ConvBnRelu")]
    pub conv_order: ConvOrder,
    #[config(default = "PoolingKind::AdaptiveMax")]
    pub pooling: PoolingKind,
    #[config(default = "[20, 20]")]
    pub pooling_output: [usize; 2],
    #[config(default = true)]
    pub append_logsoftmax: bool,
}

impl WideResNetConfig {
    /// Number of ResBlocks in each of the three stages.
    pub fn blocks_per_stage(&self) -> Result<usize, ConfigError> {
        match self.layers_per_stage {
            Some(0) => Err(ConfigError::ZeroLayersPerStage),
            Some(n) => Ok(n),
            None => {
                if self.depth < 10 || (self.depth - 4) % 6 != 0 {
                    return Err(ConfigError::InvalidDepth { depth: self.depth });
                }
                Ok((self.depth - 4) / 6)
            }
        }
    }

    /// Channel widths `[stem, stage1, stage2, stage3]`.
    pub fn channels(&self) -> [usize; 4] {
        let stage = |s: u32| 2usize.pow(3 + s) * self.widen_factor;
        [STEM_CHANNELS, stage(1), stage(2), stage(3)]
    }

    /// Check every field that would otherwise fail mid-construction.
    pub fn validate(&self) -> Result<usize, ConfigError> {
        if self.n_classes == 0 {
            return Err(ConfigError::ZeroClasses);
        }
        if self.widen_factor == 0 {
            return Err(ConfigError::ZeroWidenFactor);
        }
        if !(0.0..1.0).contains(&self.drop_rate) {
            return Err(ConfigError::InvalidDropRate { drop_rate: self.drop_rate });
        }
        let [h, w] = self.pooling_output;
        if h == 0 || w == 0 {
            return Err(ConfigError::EmptyPoolingOutput { h, w });
        }
        self.blocks_per_stage()
    }

    /// Assemble the network. Fails before allocating anything when the
    /// configuration is invalid.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<WideResNet<B>, ConfigError> {
        let n = self.validate()?;
        let channels = self.channels();

        let stem = Conv2dConfig::new([3, STEM_CHANNELS], [1, 1]).init(device);

        let mut blocks = Vec::with_capacity(3 * n);
        for (stage, &stride) in STAGE_STRIDES.iter().enumerate() {
            let (in_features, out_features) = (channels[stage], channels[stage + 1]);
            blocks.push(self.block(in_features, out_features, stride).init(device));
            for _ in 1..n {
                blocks.push(self.block(out_features, out_features, 1).init(device));
            }
        }

        let last = channels[3];
        let [pool_h, pool_w] = self.pooling_output;
        Ok(WideResNet {
            stem,
            blocks,
            head_norm: BatchNormConfig::new(last).init(device),
            head_relu: Relu::new(),
            head_conv: Conv2dConfig::new([last, 1], [1, 1]).init(device),
            classifier: LinearConfig::new(pool_h * pool_w, self.n_classes).init(device),
            max_pooling: self.pooling == PoolingKind::AdaptiveMax,
            pool_h,
            pool_w,
            append_logsoftmax: self.append_logsoftmax,
        })
    }

    fn block(&self, in_features: usize, out_features: usize, stride: usize) -> ResBlockConfig {
        ResBlockConfig {
            in_features,
            out_features,
            stride,
            drop_rate: self.drop_rate,
            conv_order: self.conv_order,
        }
    }
}

#[derive(Module, Debug)]
pub struct WideResNet<B: Backend> {
    pub stem:       Conv2d<B>,
    pub blocks:     Vec<ResBlock<B>>,
    pub head_norm:  BatchNorm<B, 2>,
    pub head_relu:  Relu,
    pub head_conv:  Conv2d<B>,
    pub classifier: Linear<B>,
    max_pooling:       bool,
    pool_h:            usize,
    pool_w:            usize,
    append_logsoftmax: bool,
}

impl<B: Backend> WideResNet<B> {
    /// images: [batch, 3, H, W] → scores: [batch, n_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.stem.forward(images);
        for block in &self.blocks {
            x = block.forward(x);
        }

        let x = self.head_relu.forward(self.head_norm.forward(x));
        let x = self.head_conv.forward(x); // [batch, 1, h, w]
        let x = self.pooling().forward(x, [self.pool_h, self.pool_w]);
        let x = x.flatten::<2>(1, 3);      // [batch, pool_h * pool_w]
        let x = self.classifier.forward(x);

        if self.append_logsoftmax {
            log_softmax(x, 1)
        } else {
            x
        }
    }

    pub fn pooling(&self) -> PoolingKind {
        if self.max_pooling {
            PoolingKind::AdaptiveMax
        } else {
            PoolingKind::AdaptiveAvg
        }
    }

    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn small(depth: usize) -> WideResNetConfig {
        WideResNetConfig::new(5)
            .with_depth(depth)
            .with_widen_factor(1)
            .with_pooling_output([2, 2])
    }

    #[test]
    fn test_block_count_follows_depth() {
        let device: <TB as Backend>::Device = Default::default();
        for depth in [10, 16, 22] {
            let net = small(depth).init::<TB>(&device).unwrap();
            assert_eq!(net.n_blocks(), 3 * ((depth - 4) / 6));
        }
    }

    #[test]
    fn test_layers_per_stage_overrides_depth() {
        let device: <TB as Backend>::Device = Default::default();
        let net = small(17).with_layers_per_stage(Some(3)).init::<TB>(&device).unwrap();
        assert_eq!(net.n_blocks(), 9);
    }

    #[test]
    fn test_invalid_depth_is_rejected() {
        for depth in [0, 4, 11, 15, 17] {
            let err = small(depth).validate().unwrap_err();
            assert_eq!(err, ConfigError::InvalidDepth { depth });
        }
        assert_eq!(
            small(16).with_layers_per_stage(Some(0)).validate().unwrap_err(),
            ConfigError::ZeroLayersPerStage
        );
    }

    #[test]
    fn test_channel_widths() {
        assert_eq!(small(16).with_widen_factor(4).channels(), [16, 64, 128, 256]);
        assert_eq!(small(16).with_widen_factor(1).channels(), [16, 16, 32, 64]);
    }

    #[test]
    fn test_resblock_output_shape() {
        let device: <TB as Backend>::Device = Default::default();
        for (stride, size, expected) in [(1, 8, 8), (2, 8, 4), (3, 8, 3), (3, 32, 11)] {
            let block = ResBlockConfig {
                in_features: 4,
                out_features: 6,
                stride,
                drop_rate: 0.1,
                conv_order: ConvOrder::ConvBnRelu,
            }
            .init::<TB>(&device);
            let y = block.forward(Tensor::zeros([2, 4, size, size], &device));
            assert_eq!(y.dims(), [2, 6, expected, expected]);
        }
    }

    #[test]
    fn test_pre_activation_network_forward() {
        let device: <TB as Backend>::Device = Default::default();
        let net = small(10)
            .with_conv_order(ConvOrder::BnReluConv)
            .with_pooling(PoolingKind::AdaptiveAvg)
            .init::<TB>(&device)
            .unwrap();
        let y = net.forward(Tensor::ones([3, 3, 12, 12], &device));
        assert_eq!(y.dims(), [3, 5]);
    }

    #[test]
    fn test_log_softmax_head_rows_sum_to_one() {
        let device: <TB as Backend>::Device = Default::default();
        let net = small(10).init::<TB>(&device).unwrap();
        let x = Tensor::<TB, 4>::random([2, 3, 9, 9], burn::tensor::Distribution::Default, &device);
        let probs = net.forward(x).exp().sum_dim(1);
        for p in probs.into_data().to_vec::<f32>().unwrap() {
            assert!((p - 1.0).abs() < 1e-4);
        }
    }
}
