// ============================================================
// Layer 3 — Configuration Errors
// ============================================================
// Failures detected while validating a configuration, before
// any network parameter is allocated. They are fatal: the
// run never starts.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("depth {depth} is invalid: expected depth >= 10 with (depth - 4) % 6 == 0")]
    InvalidDepth { depth: usize },

    #[error("layers_per_stage must be at least 1")]
    ZeroLayersPerStage,

    #[error("widen_factor must be at least 1")]
    ZeroWidenFactor,

    #[error("drop_rate {drop_rate} must lie in [0, 1)")]
    InvalidDropRate { drop_rate: f64 },

    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("pooling output size {h}x{w} must be non-empty")]
    EmptyPoolingOutput { h: usize, w: usize },

    #[error("n_classes must be at least 1")]
    ZeroClasses,
}
