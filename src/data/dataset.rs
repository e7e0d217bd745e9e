use burn::data::dataset::Dataset;

use crate::data::tinyimagenet::ImageFile;
use crate::domain::sample::ImageSample;

/// Labelled images served to Burn's DataLoader by index.
///
/// Small datasets (CIFAR, synthetic) are held decoded. Image-folder
/// datasets keep only file paths and decode inside [`Dataset::get`].
pub struct ImageDataset {
    items: Items,
}

enum Items {
    Decoded(Vec<ImageSample>),
    Files(Vec<ImageFile>),
}

impl ImageDataset {
    pub fn new(samples: Vec<ImageSample>) -> Self {
        Self { items: Items::Decoded(samples) }
    }

    pub fn from_files(files: Vec<ImageFile>) -> Self {
        Self { items: Items::Files(files) }
    }

    pub fn sample_count(&self) -> usize {
        match &self.items {
            Items::Decoded(samples) => samples.len(),
            Items::Files(files)     => files.len(),
        }
    }

    /// `[channels, height, width]` of the first sample.
    pub fn image_dims(&self) -> Option<[usize; 3]> {
        match &self.items {
            Items::Decoded(samples) => samples.first().map(ImageSample::dims),
            Items::Files(files)     => files.first().map(ImageFile::dims),
        }
    }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        match &self.items {
            Items::Decoded(samples) => samples.get(index).cloned(),
            Items::Files(files) => {
                let file = files.get(index)?;
                // None ends the epoch; serve a black image instead
                let sample = file.decode().unwrap_or_else(|e| {
                    tracing::warn!("Serving a blank image in place of '{}': {:#}", file.path.display(), e);
                    let [c, h, w] = file.dims();
                    ImageSample::new(vec![0.0; c * h * w], c, h, w, file.label)
                });
                Some(sample)
            }
        }
    }

    fn len(&self) -> usize {
        self.sample_count()
    }
}
