// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores full training snapshots.
//
// What gets saved per checkpoint (one file):
//   1. iteration      — the training step counter
//   2. aux_state      — named visualization handles
//   3. model          — network parameters (Burn record bytes)
//   4. optimizer      — Adam moment estimates (Burn record bytes)
//
// The Burn records are encoded with BinBytesRecorder at full
// precision, so a restored network reproduces its outputs bit
// for bit. The envelope around them is bincode.
//
// File naming convention:
//   <root>/<env>/checkpoints/
//     1000               ← snapshot at iteration 1000
//     2000
//     last               ← LATEST, replaced on every save
//     train_config.json  ← hyperparameters of the run
//
// Every write goes to a temp file in the same directory which is
// then renamed over the target, so a reader never observes a
// half-written "last".

use anyhow::{Context, Result};
use burn::{
    module::{AutodiffModule, Module},
    optim::Optimizer,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::application::train_use_case::TrainConfig;
use crate::domain::{aux_state::AuxState, error::SolverError};

const FORMAT_VERSION: u32 = 1;

/// Name of the snapshot rewritten on every save.
pub const LATEST: &str = "last";

type BytesRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// On-disk layout of one checkpoint file.
#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    format_version: u32,
    iteration:      usize,
    aux_state:      AuxState,
    model:          Vec<u8>,
    optimizer:      Vec<u8>,
}

/// A checkpoint read from disk whose records are not decoded yet.
///
/// Decoding needs the concrete network and optimizer types, so the
/// caller restores them one by one.
pub struct StoredCheckpoint {
    pub path:      PathBuf,
    pub iteration: usize,
    pub aux_state: AuxState,
    model:         Vec<u8>,
    optimizer:     Vec<u8>,
}

impl StoredCheckpoint {
    /// Load the saved parameters into `model`.
    pub fn restore_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        device: &B::Device,
    ) -> Result<M, SolverError> {
        let record: <M as Module<B>>::Record =
            Recorder::<B>::load(&BytesRecorder::default(), self.model.clone(), device)
                .map_err(|e| SolverError::load(&self.path, format!("model record: {e:?}")))?;
        Ok(model.load_record(record))
    }

    /// Load the saved optimizer state into `optim`.
    pub fn restore_optimizer<B, M, O>(&self, optim: O, device: &B::Device) -> Result<O, SolverError>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let record: <O as Optimizer<M, B>>::Record =
            Recorder::<B>::load(&BytesRecorder::default(), self.optimizer.clone(), device)
                .map_err(|e| SolverError::load(&self.path, format!("optimizer record: {e:?}")))?;
        Ok(optim.load_record(record))
    }

    pub fn model_bytes(&self) -> usize {
        self.model.len()
    }

    pub fn optimizer_bytes(&self) -> usize {
        self.optimizer.len()
    }
}

/// Manages the checkpoint directory of one run.
pub struct CheckpointManager {
    /// Path to the directory where checkpoints are stored
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory (`mkdir -p`) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating anything.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            anyhow::bail!("No checkpoint directory at '{}'", dir.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Write one snapshot under `name`, replacing any previous file.
    pub fn save<B, M, O>(
        &self,
        name:      &str,
        iteration: usize,
        aux_state: &AuxState,
        model:     &M,
        optim:     &O,
    ) -> Result<PathBuf, SolverError>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let path = self.path(name);
        let recorder = BytesRecorder::default();

        let model_bytes = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
            .map_err(|e| SolverError::save(&path, format!("model record: {e:?}")))?;
        let optim_bytes = Recorder::<B>::record(&recorder, optim.to_record(), ())
            .map_err(|e| SolverError::save(&path, format!("optimizer record: {e:?}")))?;

        let file = CheckpointFile {
            format_version: FORMAT_VERSION,
            iteration,
            aux_state: aux_state.clone(),
            model: model_bytes,
            optimizer: optim_bytes,
        };
        let bytes = bincode::serialize(&file).map_err(|e| SolverError::save(&path, e))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| SolverError::save(&path, e))?;
        tmp.write_all(&bytes).map_err(|e| SolverError::save(&path, e))?;
        tmp.as_file().sync_all().map_err(|e| SolverError::save(&path, e))?;
        tmp.persist(&path).map_err(|e| SolverError::save(&path, e.error))?;

        tracing::debug!("Saved checkpoint '{}' (iter {})", path.display(), iteration);
        Ok(path)
    }

    /// Read the snapshot stored under `name`.
    ///
    /// A missing file is `Ok(None)`. Anything unreadable is an error.
    pub fn read(&self, name: &str) -> Result<Option<StoredCheckpoint>, SolverError> {
        let path = self.path(name);
        if !path.is_file() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| SolverError::load(&path, e))?;
        let file: CheckpointFile =
            bincode::deserialize(&bytes).map_err(|e| SolverError::load(&path, e))?;
        if file.format_version != FORMAT_VERSION {
            return Err(SolverError::load(
                &path,
                format!("unsupported format version {}", file.format_version),
            ));
        }

        Ok(Some(StoredCheckpoint {
            path,
            iteration: file.iteration,
            aux_state: file.aux_state,
            model:     file.model,
            optimizer: file.optimizer,
        }))
    }

    /// Restore only the network weights stored under `name`.
    ///
    /// Returns the untouched `model` and `None` when there is no file.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        name:   &str,
        model:  M,
        device: &B::Device,
    ) -> Result<(M, Option<usize>), SolverError> {
        match self.read(name)? {
            Some(stored) => {
                let model = stored.restore_model::<B, M>(model, device)?;
                Ok((model, Some(stored.iteration)))
            }
            None => Ok((model, None)),
        }
    }

    /// Save the training configuration to JSON next to the checkpoints.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the configuration a run was started with.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::{AdamConfig, GradientsParams},
        prelude::*,
    };

    use crate::ml::model::{DaeNet, DaeNetConfig};

    type TB = Autodiff<NdArray>;

    fn sample_input(device: &<TB as Backend>::Device) -> Tensor<TB, 4> {
        let values: Vec<f32> = (0..32).map(|i| (i as f32) / 32.0).collect();
        Tensor::from_data(TensorData::new(values, [2, 1, 4, 4]), device)
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        assert!(mgr.read("last").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_checkpoint_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        fs::write(mgr.path("last"), b"not a checkpoint").unwrap();
        let err = mgr.read("last").err().unwrap();
        assert!(matches!(err, SolverError::CheckpointLoad { .. }));
    }

    fn adam_step<O: Optimizer<DaeNet<TB>, TB>>(net: DaeNet<TB>, optim: &mut O, x: Tensor<TB, 4>) -> DaeNet<TB> {
        let loss = (net.forward(x.clone()) - x).powf_scalar(2.0).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &net);
        optim.step(1e-3, net, grads)
    }

    fn outputs(net: &DaeNet<TB>, x: Tensor<TB, 4>) -> Vec<f32> {
        net.forward(x).into_data().to_vec().unwrap()
    }

    #[test]
    fn test_round_trip_restores_iteration_aux_and_outputs() {
        let device = Default::default();
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();

        let config = DaeNetConfig::new(1, 4, 3).with_hidden(8);
        let mut optim = AdamConfig::new().init::<TB, DaeNet<TB>>();

        // One real update so the optimizer carries state
        let x = sample_input(&device);
        let net = adam_step(config.init::<TB>(&device), &mut optim, x.clone());

        let mut aux = AuxState::default();
        aux.0.insert("recon".into(), Some("reconstruction_loss".into()));
        mgr.save::<TB, _, _>("7", 7, &aux, &net, &optim).unwrap();

        let stored = mgr.read("7").unwrap().unwrap();
        assert_eq!(stored.iteration, 7);
        assert_eq!(stored.aux_state, aux);

        let restored = stored.restore_model::<TB, _>(config.init::<TB>(&device), &device).unwrap();
        let mut restored_optim = stored
            .restore_optimizer::<TB, _, _>(AdamConfig::new().init::<TB, DaeNet<TB>>(), &device)
            .unwrap();
        assert_eq!(outputs(&net, x.clone()), outputs(&restored, x.clone()));

        // The next update continues from the saved moments
        let mut stateless = AdamConfig::new().init::<TB, DaeNet<TB>>();
        let from_fresh = adam_step(restored.clone(), &mut stateless, x.clone());
        let continued = adam_step(net, &mut optim, x.clone());
        let resumed = adam_step(restored, &mut restored_optim, x.clone());
        assert_eq!(outputs(&continued, x.clone()), outputs(&resumed, x.clone()));
        assert_ne!(outputs(&continued, x.clone()), outputs(&from_fresh, x));
    }

    #[test]
    fn test_save_replaces_latest() {
        let device = Default::default();
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let net = DaeNetConfig::new(1, 4, 2).with_hidden(4).init::<TB>(&device);
        let optim = AdamConfig::new().init::<TB, DaeNet<TB>>();

        mgr.save::<TB, _, _>(LATEST, 1, &AuxState::default(), &net, &optim).unwrap();
        mgr.save::<TB, _, _>(LATEST, 2, &AuxState::default(), &net, &optim).unwrap();
        assert_eq!(mgr.read(LATEST).unwrap().unwrap().iteration, 2);

        // Only LATEST remains; no temp files are left behind
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
