// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: each use case wires the data,
// ml and infra layers together for one command.
//
//   train_use_case.rs    — TrainConfig, presets, one full run
//   evaluate_use_case.rs — accuracy of a finished run's weights
//
// Rules for this layer:
//   - No model code or tensor math here
//   - No argument parsing or printing (that's Layer 1)
//
// Reference: Clean Architecture pattern

// The training workflow
pub mod train_use_case;

// Re-scoring a stored run
pub mod evaluate_use_case;
