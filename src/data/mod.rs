// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the files on disk and the batches the
// training engine consumes.
//
//   <dset_dir>/<dataset>/images.bin (+ attributes.csv)
//       │
//       ▼
//   DatasetLoader     → reads pixels and attribute rows
//       │
//       ▼
//   ImageDataset /    → implement Burn's Dataset trait
//   AttributeDataset
//       │
//       ▼
//   ImageBatcher /    → stack samples into tensor batches
//   ScanBatcher
//       │
//       ▼
//   LoaderSource      → BatchSource handed to the engine
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads preprocessed datasets from disk
pub mod loader;

/// Implements Burn's Dataset trait for images and attributes
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Reshuffling batch source for the training engine
pub mod source;
