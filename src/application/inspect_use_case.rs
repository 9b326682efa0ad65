// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Reads a checkpoint without building any network and describes
// it: iteration, record sizes, visualization handles, and the
// configuration the run was started with (when present).

use std::{fmt::Write as _, path::PathBuf};

use anyhow::{Context, Result};

use crate::infra::checkpoint::CheckpointManager;

pub struct InspectUseCase {
    checkpoints: CheckpointManager,
    name:        String,
}

impl InspectUseCase {
    /// Fails when `ckpt_dir` does not exist.
    pub fn new(ckpt_dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            checkpoints: CheckpointManager::open(ckpt_dir)?,
            name:        name.into(),
        })
    }

    /// Human-readable summary of the checkpoint.
    pub fn describe(&self) -> Result<String> {
        let stored = self
            .checkpoints
            .read(&self.name)?
            .with_context(|| format!("No checkpoint at '{}'", self.checkpoints.path(&self.name).display()))?;

        let mut out = String::new();
        writeln!(out, "checkpoint: {}", stored.path.display())?;
        writeln!(out, "iteration:  {}", stored.iteration)?;
        writeln!(out, "model:      {} bytes", stored.model_bytes())?;
        writeln!(out, "optimizer:  {} bytes", stored.optimizer_bytes())?;
        writeln!(out, "windows:")?;
        for name in stored.aux_state.names() {
            let handle = stored.aux_state.get(name);
            writeln!(out, "  {name:<6} {}", handle.as_deref().unwrap_or("-"))?;
        }

        match self.checkpoints.load_config() {
            Ok(cfg) => writeln!(
                out,
                "run:        {:?} on {} (z {}/{}/{})",
                cfg.solver, cfg.dataset, cfg.dae_z_dim, cfg.vae_z_dim, cfg.scan_z_dim
            )?,
            Err(e) => tracing::debug!("No run config next to checkpoint: {e:#}"),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
    };

    use crate::application::train_use_case::TrainConfig;
    use crate::domain::aux_state::AuxState;
    use crate::ml::model::{DaeNet, DaeNetConfig};

    type TB = Autodiff<NdArray>;

    #[test]
    fn test_describe_lists_iteration_and_windows() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let net = DaeNetConfig::new(1, 2, 2).with_hidden(4).init::<TB>(&Default::default());
        let optim = AdamConfig::new().init::<TB, DaeNet<TB>>();
        let mut aux = AuxState::default();
        aux.0.insert("recon".into(), Some("reconstruction_loss".into()));
        manager.save::<TB, _, _>("last", 12, &aux, &net, &optim).unwrap();
        manager.save_config(&TrainConfig::default()).unwrap();

        let text = InspectUseCase::new(tmp.path(), "last").unwrap().describe().unwrap();
        assert!(text.contains("iteration:  12"));
        assert!(text.contains("recon  reconstruction_loss"));
        assert!(text.contains("Vae on celeba"));
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = InspectUseCase::new(tmp.path(), "last").unwrap().describe().unwrap_err();
        assert!(err.to_string().contains("No checkpoint"));
    }

    #[test]
    fn test_missing_directory_is_not_created() {
        let tmp = tempfile::tempdir().unwrap();
        let typo = tmp.path().join("chekpoints");
        let err = InspectUseCase::new(&typo, "last").err().unwrap();
        assert!(err.to_string().contains("No checkpoint directory"));
        assert!(!typo.exists());
    }
}
