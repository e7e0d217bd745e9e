// ============================================================
// Layer 4 — Dataset Provider
// ============================================================
// Single entry point that turns a dataset selector and a subset
// into Burn-ready data:
//
//   DatasetKind + Subset ──load──▶ ImageDataset
//   ImageDataset         ──loader─▶ Arc<dyn DataLoader<ImageBatch>>
//
// Loaders are restartable: every `.iter()` call walks the
// dataset again, so the training loop asks for a fresh pass
// each epoch.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    cifar::{CifarLoader, CifarVariant},
    dataset::ImageDataset,
    synthetic::SyntheticSpec,
    tinyimagenet::TinyImageNetLoader,
};
use crate::domain::sample::Subset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DatasetKind {
    #[serde(rename = "tinyimagenet")]
    #[value(name = "tinyimagenet")]
    TinyImageNet,
    Cifar10,
    Cifar100,
    Synthetic,
}

impl Default for DatasetKind {
    fn default() -> Self {
        DatasetKind::TinyImageNet
    }
}

/// Everything needed to materialise one subset of the selected dataset.
#[derive(Debug, Clone)]
pub struct DatasetProvider {
    pub kind:      DatasetKind,
    pub data_root: PathBuf,
    pub synthetic: SyntheticSpec,
    pub seed:      u64,
}

impl DatasetProvider {
    pub fn load(&self, subset: Subset) -> Result<ImageDataset> {
        let dataset = match self.kind {
            DatasetKind::TinyImageNet => {
                ImageDataset::from_files(TinyImageNetLoader::new(&self.data_root).load(subset)?)
            }
            DatasetKind::Cifar10 => ImageDataset::new(
                CifarLoader::new(&self.data_root, CifarVariant::Cifar10).load(subset)?,
            ),
            DatasetKind::Cifar100 => ImageDataset::new(
                CifarLoader::new(&self.data_root, CifarVariant::Cifar100).load(subset)?,
            ),
            DatasetKind::Synthetic => ImageDataset::new(self.synthetic.load(subset, self.seed)),
        };
        Ok(dataset)
    }
}

/// Batch a dataset on `device`. Training loaders shuffle with
/// `shuffle_seed`; evaluation loaders keep dataset order.
pub fn build_loader<B: Backend>(
    dataset:      ImageDataset,
    device:       B::Device,
    batch_size:   usize,
    num_workers:  usize,
    shuffle_seed: Option<u64>,
) -> Arc<dyn DataLoader<ImageBatch<B>>> {
    let builder = DataLoaderBuilder::new(ImageBatcher::<B>::new(device))
        .batch_size(batch_size)
        .num_workers(num_workers.max(1));
    match shuffle_seed {
        Some(seed) => builder.shuffle(seed).build(dataset),
        None       => builder.build(dataset),
    }
}
