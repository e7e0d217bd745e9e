// ============================================================
// Layer 3 — Image Sample Domain Type
// ============================================================
// One labelled image, already decoded and scaled to [0, 1].
// Pixels are stored channel-first (CHW) because that is the
// layout the convolution layers consume:
//
//   pixels[c * height * width + y * width + x]
//
// Reference: Rust Book §5 (Structs and Methods)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which half of a dataset to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum Subset {
    Train,
    Test,
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subset::Train => write!(f, "train"),
            Subset::Test  => write!(f, "test"),
        }
    }
}

/// A decoded image with its class index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    /// CHW pixel values in [0, 1]
    pub pixels: Vec<f32>,

    pub channels: usize,
    pub height:   usize,
    pub width:    usize,

    /// Class index in `0..n_classes`
    pub label: usize,
}

impl ImageSample {
    pub fn new(pixels: Vec<f32>, channels: usize, height: usize, width: usize, label: usize) -> Self {
        debug_assert_eq!(pixels.len(), channels * height * width);
        Self { pixels, channels, height, width, label }
    }

    /// Build a sample from interleaved RGB bytes (HWC, as stored in
    /// image files) by transposing to CHW and scaling to [0, 1].
    pub fn from_rgb_hwc(bytes: &[u8], height: usize, width: usize, label: usize) -> Self {
        let plane = height * width;
        let mut pixels = vec![0.0f32; 3 * plane];
        for (i, px) in bytes.chunks_exact(3).enumerate() {
            for c in 0..3 {
                pixels[c * plane + i] = px[c] as f32 / 255.0;
            }
        }
        Self::new(pixels, 3, height, width, label)
    }

    /// Build a sample from planar bytes (CHW, as stored in the CIFAR
    /// binary batches) by scaling to [0, 1].
    pub fn from_planar(bytes: &[u8], channels: usize, height: usize, width: usize, label: usize) -> Self {
        let pixels = bytes.iter().map(|&b| b as f32 / 255.0).collect();
        Self::new(pixels, channels, height, width, label)
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hwc_is_transposed_to_chw() {
        // 1x2 image: red pixel then blue pixel
        let bytes = [255u8, 0, 0, 0, 0, 255];
        let s = ImageSample::from_rgb_hwc(&bytes, 1, 2, 7);
        assert_eq!(s.dims(), [3, 1, 2]);
        assert_eq!(s.pixels, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(s.label, 7);
    }

    #[test]
    fn test_planar_is_scaled() {
        let s = ImageSample::from_planar(&[0, 51, 255], 3, 1, 1, 0);
        assert_eq!(s.pixels, vec![0.0, 0.2, 1.0]);
    }

    #[test]
    fn test_subset_display() {
        assert_eq!(Subset::Train.to_string(), "train");
        assert_eq!(Subset::Test.to_string(), "test");
    }
}
