// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop reports into two sinks and never knows
// where the data ends up:
//
//   MetricSink   → scalar curves (loss, accuracy, norms)
//   ArtifactSink → files produced by the run (the weights)
//
// Implementations:
//   - RunStore (infra/run_store.rs) → a directory per run
//   - MemorySink (tests)            → an in-memory Vec
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::{Path, PathBuf};

use anyhow::Result;

// ─── MetricSink ───────────────────────────────────────────────────────────────
/// Append-only sink for `(name, value, step)` observations.
///
/// Steps must not go backwards for a given metric name;
/// implementations reject such a record with an error.
pub trait MetricSink {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> Result<()>;
}

// ─── ArtifactSink ─────────────────────────────────────────────────────────────
/// Persists a file as part of the run record under a logical name.
pub trait ArtifactSink {
    /// Store `file` as artifact `name`, returning where it now lives.
    fn add_artifact(&mut self, file: &Path, name: &str) -> Result<PathBuf>;
}
