// ============================================================
// Layer 4 — Synthetic Images
// ============================================================
// A small, seeded, learnable dataset for smoke runs and tests.
// Sample i has label i % n_classes and every pixel is
//
//     (label + 0.5) / n_classes  +  noise,   noise ~ U(-0.1, 0.1)
//
// clamped to [0, 1], so classes differ in mean intensity.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::splitter::split_train_test;
use crate::domain::sample::{ImageSample, Subset};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub n_classes:  usize,
    pub n_samples:  usize,
    pub image_size: usize,
    /// Fraction of samples kept for training.
    pub train_fraction: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self { n_classes: 4, n_samples: 8, image_size: 8, train_fraction: 0.75 }
    }
}

impl SyntheticSpec {
    pub fn generate(&self, seed: u64) -> Vec<ImageSample> {
        let mut rng = StdRng::seed_from_u64(seed);
        let classes = self.n_classes.max(1);
        let side    = self.image_size;

        (0..self.n_samples)
            .map(|i| {
                let label = i % classes;
                let base  = (label as f32 + 0.5) / classes as f32;
                let pixels = (0..3 * side * side)
                    .map(|_| (base + rng.gen_range(-0.1f32..0.1)).clamp(0.0, 1.0))
                    .collect();
                ImageSample::new(pixels, 3, side, side, label)
            })
            .collect()
    }

    /// Generate the pool and return one side of the seeded split.
    pub fn load(&self, subset: Subset, seed: u64) -> Vec<ImageSample> {
        let (train, test) = split_train_test(self.generate(seed), self.train_fraction, seed);
        match subset {
            Subset::Train => train,
            Subset::Test  => test,
        }
    }
}
