// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor math lives here.
//
//   model.rs       — DAE, beta-VAE (H/B) and SCAN networks
//   loss.rs        — reconstruction, KL, dual KL, capacity ramp
//   occlusion.rs   — random rectangle corruption for the DAE
//   frozen.rs      — read-only handles to trained upstream nets
//   trainer.rs     — Strategy trait and the shared training engine
//   dae.rs / vae.rs / scan.rs — one strategy per model family
//   composition.rs — loads and freezes upstream nets for vae/scan
//
// Dependency chain between the families:
//
//   DAE ──frozen──▶ VAE (perceptual) ──frozen──▶ SCAN
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Network architectures
pub mod model;

/// Loss functions and the capacity schedule
pub mod loss;

/// Occlusion masks for denoising
pub mod occlusion;

/// Frozen upstream networks
pub mod frozen;

/// Training engine and the Strategy trait
pub mod trainer;

/// Denoising autoencoder strategy
pub mod dae;

/// beta-VAE strategy (pixel or perceptual reconstruction)
pub mod vae;

/// SCAN strategy and its cross-modal helpers
pub mod scan;

/// Building the frozen upstream chain
pub mod composition;
