// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<ImageSample>
// into one image tensor and one label tensor.
//
//   Input:  N samples, each [C, H, W] (CHW, already in [0, 1])
//   Output: images [N, C, H, W], labels [N]
//
// All samples of a dataset share the same dimensions
// (TinyImageNet 3x64x64, CIFAR 3x32x32), so the pixels can be
// concatenated and reshaped without padding.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::sample::ImageSample;

#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,

    /// [batch_size] class indices
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }
}

/// Holds the target device so tensors are created where the
/// model lives.
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ImageSample, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageSample>) -> ImageBatch<B> {
        let batch_size = items.len();
        let [channels, height, width] = items[0].dims();

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| s.pixels.iter().copied())
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .map(|s| s.label as i32)
            .collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, channels, height, width]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes_and_layout() {
        let batcher = ImageBatcher::<NdArray>::new(Default::default());
        let a = ImageSample::new(vec![0.1; 12], 3, 2, 2, 1);
        let b = ImageSample::new(vec![0.9; 12], 3, 2, 2, 3);
        let batch = batcher.batch(vec![a, b]);

        assert_eq!(batch.images.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.len(), 2);
        let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![1, 3]);

        let second = batch.images.slice([1..2, 0..3, 0..2, 0..2]);
        let values = second.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (v - 0.9).abs() < 1e-6));
    }
}
