// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence used by the engine and use cases:
//
//   checkpoint.rs — one bincode envelope per snapshot holding the
//                   iteration, visualization handles, and Burn
//                   records for model and optimizer; written with
//                   an atomic rename. Also saves/loads TrainConfig
//                   as JSON next to the checkpoints.
//
//   metrics.rs    — MetricSink implementations: CSV line windows
//                   and text reports, or nothing at all.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint saving and loading
pub mod checkpoint;

/// CSV metric sink
pub mod metrics;
