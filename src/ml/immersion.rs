// ============================================================
// Layer 5 — Immersion (fixed shortcut projection)
// ============================================================
// Residual shortcuts need to match the residual branch in
// both channel count and spatial size. Instead of a learned
// 1x1 projection, the shortcut uses a FIXED convolution whose
// kernel is filled with
//
//     1 / (in_channels * kernel_h * kernel_w)
//
// i.e. every output channel is the spatial/channel mean of the
// input window. The kernel is held as a constant tensor, not a
// Param, so the optimiser never sees it and it is never tracked
// for gradients.

use burn::{
    prelude::*,
    tensor::{module::conv2d, ops::ConvOptions},
};

#[derive(Module, Debug)]
pub struct Immersion<B: Backend> {
    /// [out_channels, in_channels, k, k]
    weight:  Tensor<B, 4>,
    stride:  usize,
    padding: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmersionConfig {
    pub in_channels:  usize,
    pub out_channels: usize,
    pub kernel_size:  usize,
    pub stride:       usize,
    pub padding:      usize,
}

impl ImmersionConfig {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize) -> Self {
        Self { in_channels, out_channels, kernel_size, stride: 1, padding: 0 }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Immersion<B> {
        let k = self.kernel_size;
        let fill = 1.0 / (self.in_channels * k * k) as f64;
        let weight = Tensor::<B, 4>::ones([self.out_channels, self.in_channels, k, k], device)
            .mul_scalar(fill);
        Immersion { weight, stride: self.stride, padding: self.padding }
    }
}

impl<B: Backend> Immersion<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        assert!(
            !self.weight.is_require_grad(),
            "immersion kernel must never be tracked for gradients"
        );
        let options = ConvOptions::new(
            [self.stride, self.stride],
            [self.padding, self.padding],
            [1, 1],
            1,
        );
        conv2d(input, self.weight.clone(), None, options)
    }

    /// Snapshot of the fixed kernel.
    pub fn weight(&self) -> Tensor<B, 4> {
        self.weight.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_kernel_is_uniform_average() {
        let device: <TB as Backend>::Device = Default::default();
        let imm = ImmersionConfig::new(4, 6, 3).init::<TB>(&device);
        assert_eq!(imm.weight().dims(), [6, 4, 3, 3]);
        let values = imm.weight().into_data().to_vec::<f32>().unwrap();
        let expected = 1.0 / 36.0;
        assert!(values.iter().all(|v| (v - expected).abs() < 1e-7));
    }

    #[test]
    fn test_constant_input_is_preserved_per_channel() {
        // averaging a constant field keeps the constant, on every output channel
        let device: <TB as Backend>::Device = Default::default();
        let imm = ImmersionConfig::new(2, 5, 1).init::<TB>(&device);
        let x = Tensor::<TB, 4>::full([1, 2, 4, 4], 3.0, &device);
        let y = imm.forward(x);
        assert_eq!(y.dims(), [1, 5, 4, 4]);
        let values = y.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-5));
    }

    #[test]
    fn test_stride_subsamples() {
        let device: <TB as Backend>::Device = Default::default();
        let imm = ImmersionConfig::new(3, 8, 1).with_stride(3).init::<TB>(&device);
        let y = imm.forward(Tensor::<TB, 4>::zeros([2, 3, 10, 10], &device));
        // (10 - 1) / 3 + 1
        assert_eq!(y.dims(), [2, 8, 4, 4]);
    }
}
