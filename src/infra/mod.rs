// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the file system on behalf of a run:
//
//   checkpoint.rs — weights (.mpk, Burn's NamedMpkFileRecorder)
//                   and the config.json needed to rebuild the
//                   network before loading them
//
//   run_store.rs  — one numbered directory per training run;
//                   implements the MetricSink and ArtifactSink
//                   traits the training loop reports into
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Weights and config persistence
pub mod checkpoint;

/// Per-run directory with metrics, manifest and artifacts
pub mod run_store;
