// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe WHAT the system
// works with, independent of Burn or the filesystem:
//
//   sample.rs — one decoded image with its label, and the
//               train/test subset selector
//   metric.rs — a single (name, value, step) metric record
//   error.rs  — configuration-validation failures
//   traits.rs — the metric and artifact sinks a training run
//               reports into
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A decoded image and its class label
pub mod sample;

// Scalar metric records
pub mod metric;

// Typed configuration errors
pub mod error;

// Sinks that training reports metrics and artifacts into
pub mod traits;
