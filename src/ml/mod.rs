// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network, loss and optimiser code lives here.
//
//   layers.rs    — ConvUnit: conv / batch-norm / ReLU / dropout
//                  in post- or pre-activation order
//   immersion.rs — fixed averaging convolution for shortcuts
//   pooling.rs   — adaptive max / average pooling to a fixed grid
//   model.rs     — ResBlock and the Wide-ResNet assembler
//   params.rs    — named parameter walk, norms, re-initialisation
//   objective.rs — optimiser and loss selection
//   evaluator.rs — top-1 accuracy over a data loader
//   trainer.rs   — the epoch / batch loop and its metrics
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Zagoruyko & Komodakis (2016) Wide Residual Networks

/// Convolution units in both orderings
pub mod layers;

/// Non-trainable shortcut projection
pub mod immersion;

pub mod pooling;

/// ResBlock and WideResNet
pub mod model;

/// Parameter names, norms and init scheme
pub mod params;

pub mod objective;

pub mod evaluator;

/// Training loop with per-batch and per-epoch metrics
pub mod trainer;
