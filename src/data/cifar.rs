// ============================================================
// Layer 4 — CIFAR Binary Loader
// ============================================================
// Reads the "binary version" of CIFAR-10 and CIFAR-100.
//
// Record layout (one image per record, no header):
//
//   CIFAR-10:   <label:1>              <pixels:3072>
//   CIFAR-100:  <coarse:1> <fine:1>    <pixels:3072>
//
// The 3072 pixel bytes are planar: 1024 red, 1024 green,
// 1024 blue, each plane row-major 32x32. CIFAR-100 is trained
// on the fine (100-class) label.
//
// Files:
//   cifar-10-batches-bin/data_batch_{1..5}.bin, test_batch.bin
//   cifar-100-binary/train.bin, test.bin

use anyhow::{bail, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::sample::{ImageSample, Subset};

pub const CIFAR_SIDE: usize = 32;
pub const CIFAR_PIXELS: usize = 3 * CIFAR_SIDE * CIFAR_SIDE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CifarVariant {
    Cifar10,
    Cifar100,
}

impl CifarVariant {
    pub fn dir_name(&self) -> &'static str {
        match self {
            CifarVariant::Cifar10  => "cifar-10-batches-bin",
            CifarVariant::Cifar100 => "cifar-100-binary",
        }
    }

    /// Bytes of label data in front of each record's pixels.
    fn label_bytes(&self) -> usize {
        match self {
            CifarVariant::Cifar10  => 1,
            CifarVariant::Cifar100 => 2,
        }
    }

    pub fn record_len(&self) -> usize {
        self.label_bytes() + CIFAR_PIXELS
    }

    pub fn files(&self, subset: Subset) -> Vec<&'static str> {
        match (self, subset) {
            (CifarVariant::Cifar10, Subset::Train) => vec![
                "data_batch_1.bin",
                "data_batch_2.bin",
                "data_batch_3.bin",
                "data_batch_4.bin",
                "data_batch_5.bin",
            ],
            (CifarVariant::Cifar10, Subset::Test)  => vec!["test_batch.bin"],
            (CifarVariant::Cifar100, Subset::Train) => vec!["train.bin"],
            (CifarVariant::Cifar100, Subset::Test)  => vec!["test.bin"],
        }
    }
}

pub struct CifarLoader {
    dir:     PathBuf,
    variant: CifarVariant,
}

impl CifarLoader {
    /// `data_root` is the directory containing the extracted archive.
    pub fn new(data_root: impl AsRef<Path>, variant: CifarVariant) -> Self {
        Self { dir: data_root.as_ref().join(variant.dir_name()), variant }
    }

    pub fn load(&self, subset: Subset) -> Result<Vec<ImageSample>> {
        let mut samples = Vec::new();
        for file in self.variant.files(subset) {
            let path = self.dir.join(file);
            let bytes = fs::read(&path)
                .with_context(|| format!("Cannot read CIFAR batch '{}'", path.display()))?;
            let parsed = parse_records(&bytes, self.variant)
                .with_context(|| format!("Malformed CIFAR batch '{}'", path.display()))?;
            tracing::debug!("Read {} images from '{}'", parsed.len(), path.display());
            samples.extend(parsed);
        }
        tracing::info!("Loaded {} {:?} {} images", samples.len(), self.variant, subset);
        Ok(samples)
    }
}

/// Decode every record in one batch file.
pub fn parse_records(bytes: &[u8], variant: CifarVariant) -> Result<Vec<ImageSample>> {
    let record_len = variant.record_len();
    if bytes.len() % record_len != 0 {
        bail!(
            "{} bytes is not a multiple of the {}-byte record size",
            bytes.len(),
            record_len
        );
    }

    let label_bytes = variant.label_bytes();
    let samples = bytes
        .chunks_exact(record_len)
        .map(|record| {
            // CIFAR-100 puts the fine label second
            let label = record[label_bytes - 1] as usize;
            ImageSample::from_planar(&record[label_bytes..], 3, CIFAR_SIDE, CIFAR_SIDE, label)
        })
        .collect();
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(labels: &[u8], fill: u8) -> Vec<u8> {
        let mut r = labels.to_vec();
        r.extend(std::iter::repeat(fill).take(CIFAR_PIXELS));
        r
    }

    #[test]
    fn test_cifar10_records() {
        let mut bytes = record(&[3], 255);
        bytes.extend(record(&[9], 0));
        let samples = parse_records(&bytes, CifarVariant::Cifar10).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, 3);
        assert_eq!(samples[0].dims(), [3, 32, 32]);
        assert!(samples[0].pixels.iter().all(|&p| p == 1.0));
        assert_eq!(samples[1].label, 9);
    }

    #[test]
    fn test_cifar100_uses_fine_label() {
        let bytes = record(&[4, 87], 10);
        let samples = parse_records(&bytes, CifarVariant::Cifar100).unwrap();
        assert_eq!(samples[0].label, 87);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let mut bytes = record(&[1], 0);
        bytes.pop();
        assert!(parse_records(&bytes, CifarVariant::Cifar10).is_err());
    }

    #[test]
    fn test_loader_reads_all_train_batches() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(CifarVariant::Cifar10.dir_name());
        fs::create_dir_all(&dir).unwrap();
        for (i, file) in CifarVariant::Cifar10.files(Subset::Train).iter().enumerate() {
            fs::write(dir.join(file), record(&[i as u8], 0)).unwrap();
        }
        let samples = CifarLoader::new(root.path(), CifarVariant::Cifar10)
            .load(Subset::Train)
            .unwrap();
        let labels: Vec<usize> = samples.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = CifarLoader::new(root.path(), CifarVariant::Cifar100)
            .load(Subset::Test)
            .unwrap_err();
        assert!(err.to_string().contains("test.bin"));
    }
}
