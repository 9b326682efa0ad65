// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types shared by every other layer:
//
//   config.rs    — dataset / model / objective / distribution enums
//   error.rs     — SolverError
//   gather.rs    — fixed-schema metric accumulator
//   aux_state.rs — checkpointed visualization handles
//   traits.rs    — BatchSource and MetricSink
//
// No Burn types and no file I/O in this layer.

pub mod aux_state;

pub mod config;

pub mod error;

pub mod gather;

pub mod traits;
