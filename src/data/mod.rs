// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between image files on disk and tensor batches
// on the training device:
//
//   tiny-imagenet-200/  cifar-*-bin/  (or synthetic)
//       │
//       ▼
//   TinyImageNetLoader / CifarLoader / SyntheticSpec
//       │                → file index, or decoded CHW in [0, 1]
//       ▼
//   ImageDataset         → implements Burn's Dataset trait,
//       │                  decoding image files on `get`
//       │
//       ▼
//   ImageBatcher         → stacks samples into [N, 3, H, W]
//       │
//       ▼
//   DataLoader           → feeds batches to the training loop
//
// DatasetProvider picks the loader from the configured
// DatasetKind; nothing above this layer knows file formats.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// TinyImageNet image-folder reader
pub mod tinyimagenet;

/// CIFAR-10 / CIFAR-100 binary batch reader
pub mod cifar;

/// Seeded synthetic images for smoke runs and tests
pub mod synthetic;

/// Implements Burn's Dataset trait over decoded images or image files
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/test splitting
pub mod splitter;

/// Dataset selector and DataLoader construction
pub mod provider;
