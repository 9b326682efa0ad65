// ============================================================
// Layer 3 — Solver Errors
// ============================================================
// Typed failures the solver can report. The application and CLI
// layers wrap these in anyhow::Error with extra context.
//
// Configuration errors are raised while a solver is being built,
// before any batch is pulled. Checkpoint errors are fatal: a
// corrupt checkpoint is never replaced by an older one.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    /// Dataset identity not in {dsprites, 3dchairs, celeba}
    #[error("unknown dataset '{0}' (expected dsprites, 3dchairs or celeba)")]
    UnknownDataset(String),

    /// VAE architecture variant not in {H, B}
    #[error("unknown model variant '{0}' (only model H or B is supported)")]
    UnknownModel(String),

    /// VAE objective not in {H, B}
    #[error("unknown objective '{0}' (only objective H or B is supported)")]
    UnknownObjective(String),

    /// Reconstruction distribution not in {bernoulli, gaussian}
    #[error("unknown reconstruction distribution '{0}'")]
    UnknownDistribution(String),

    /// SCAN and the VAE must share one latent size for the dual KL term
    #[error("SCAN latent size {scan} does not match the beta-VAE latent size {vae}")]
    LatentMismatch { scan: usize, vae: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot load checkpoint '{path}': {reason}")]
    CheckpointLoad { path: PathBuf, reason: String },

    #[error("cannot save checkpoint '{path}': {reason}")]
    CheckpointSave { path: PathBuf, reason: String },

    #[error("data source yielded no batches")]
    EmptyDataSource,

    #[error("cannot load dataset from '{path}': {reason}")]
    DataLoad { path: PathBuf, reason: String },
}

impl SolverError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CheckpointLoad { path: path.into(), reason: reason.to_string() }
    }

    pub fn save(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CheckpointSave { path: path.into(), reason: reason.to_string() }
    }

    pub fn data(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DataLoad { path: path.into(), reason: reason.to_string() }
    }
}
