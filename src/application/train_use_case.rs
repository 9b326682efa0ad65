// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Builds one solver from the configuration and trains it:
//
//   Step 0: Seed the backend RNG       (weights, sampling noise)
//   Step 1: Resolve dataset identity → (nc, distribution)
//   Step 2: Prepare run directories   <root>/<env>/{ckpt,output}
//   Step 3: Save config               (Layer 6 - infra)
//   Step 4: Freeze upstream models    (Layer 5 - ml, vae/scan only)
//   Step 5: Load dataset + batcher    (Layer 4 - data)
//   Step 6: Build engine, resume      (Layer 5 - ml)
//   Step 7: Run training loop         (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    module::AutodiffModule,
    optim::{AdamConfig, Optimizer},
    tensor::backend::{AutodiffBackend, Backend},
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{ImageBatch, ImageBatcher, ScanBatch, ScanBatcher},
    dataset::{AttributeItem, ImageItem},
    loader::DatasetLoader,
    source::LoaderSource,
};
use crate::domain::{
    config::{DatasetKind, ModelVariant, ObjectiveKind},
    error::SolverError,
    traits::{BatchSource, MetricSink},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{CsvMetricSink, DisabledSink},
};
use crate::ml::{
    composition::{frozen_dae, frozen_vae},
    dae::DaeStrategy,
    loss::CapacitySchedule,
    model::{BetaVaeNetConfig, DaeNetConfig, ScanNetConfig},
    scan::ScanStrategy,
    trainer::{EngineConfig, Strategy, TrainingEngine},
    vae::{Objective, ReconTarget, VaeStrategy},
};

/// Backend used by the command line.
pub type TrainBackend = Autodiff<Wgpu>;

// ─── Solver selection ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverKind {
    /// Denoising autoencoder
    Dae,
    /// beta-VAE with pixel-space reconstruction
    OriVae,
    /// beta-VAE with reconstruction in DAE feature space
    Vae,
    /// Symbol grounding on a frozen perceptual beta-VAE
    Scan,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All options of a run. Serialisable so it can be saved next to the
// checkpoints and read back by `inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub solver:           SolverKind,
    pub dataset:          String,
    pub dset_dir:         String,
    pub image_size:       usize,
    pub batch_size:       usize,
    pub seed:             u64,
    pub max_iter:         usize,
    pub checkpoint_every: usize,
    pub gather_every:     usize,
    pub ckpt_name:        String,
    pub root_dir:         String,
    pub ckpt_dir:         String,
    pub output_dir:       String,
    pub vis_on:           bool,
    pub objective:        String,
    pub model:            String,
    pub beta:             f64,
    pub gamma:            f64,
    pub c_max:            f64,
    pub c_stop_iter:      usize,
    pub lr:               f64,
    pub beta1:            f64,
    pub beta2:            f64,
    pub epsilon:          f64,
    pub hidden:           usize,
    pub dae_z_dim:        usize,
    pub vae_z_dim:        usize,
    pub scan_z_dim:       usize,
    pub dae_env_name:     String,
    pub vae_env_name:     String,
    pub scan_env_name:    String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            solver:           SolverKind::Vae,
            dataset:          "celeba".to_string(),
            dset_dir:         "data".to_string(),
            image_size:       64,
            batch_size:       64,
            seed:             1,
            max_iter:         1_000_000,
            checkpoint_every: 10_000,
            gather_every:     1_000,
            ckpt_name:        "last".to_string(),
            root_dir:         "runs".to_string(),
            ckpt_dir:         "checkpoints".to_string(),
            output_dir:       "outputs".to_string(),
            vis_on:           true,
            objective:        "H".to_string(),
            model:            "H".to_string(),
            beta:             4.0,
            gamma:            1000.0,
            c_max:            25.0,
            c_stop_iter:      100_000,
            lr:               1e-4,
            beta1:            0.9,
            beta2:            0.999,
            epsilon:          1e-8,
            hidden:           256,
            dae_z_dim:        100,
            vae_z_dim:        32,
            scan_z_dim:       32,
            dae_env_name:     "DAE".to_string(),
            vae_env_name:     "VAE".to_string(),
            scan_env_name:    "SCAN".to_string(),
        }
    }
}

/// Where one run keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirs {
    pub ckpt_dir:   PathBuf,
    pub output_dir: PathBuf,
}

impl TrainConfig {
    pub fn dataset_kind(&self) -> Result<DatasetKind, SolverError> {
        self.dataset.parse()
    }

    pub fn env_name(&self) -> &str {
        match self.solver {
            SolverKind::Dae => &self.dae_env_name,
            SolverKind::OriVae | SolverKind::Vae => &self.vae_env_name,
            SolverKind::Scan => &self.scan_env_name,
        }
    }

    /// `<root_dir>/<env>/<ckpt_dir>` and `<root_dir>/<env>/<output_dir>`
    pub fn run_dirs(&self, env_name: &str) -> RunDirs {
        let run = PathBuf::from(&self.root_dir).join(env_name);
        RunDirs {
            ckpt_dir:   run.join(&self.ckpt_dir),
            output_dir: run.join(&self.output_dir),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_iter:         self.max_iter,
            checkpoint_every: self.checkpoint_every,
            gather_every:     self.gather_every,
            lr:               self.lr,
            vis_on:           self.vis_on,
            ckpt_name:        self.ckpt_name.clone(),
        }
    }

    pub fn adam(&self) -> AdamConfig {
        AdamConfig::new()
            .with_beta_1(self.beta1 as f32)
            .with_beta_2(self.beta2 as f32)
            .with_epsilon(self.epsilon as f32)
    }

    pub fn dae_net(&self, kind: DatasetKind) -> DaeNetConfig {
        DaeNetConfig::new(kind.channels(), self.image_size, self.dae_z_dim).with_hidden(self.hidden)
    }

    pub fn vae_net(&self, kind: DatasetKind) -> Result<BetaVaeNetConfig, SolverError> {
        let hidden_layers = match self.model.parse::<ModelVariant>()? {
            ModelVariant::H => 1,
            ModelVariant::B => 2,
        };
        Ok(BetaVaeNetConfig::new(kind.channels(), self.image_size, self.vae_z_dim)
            .with_hidden_layers(hidden_layers)
            .with_hidden(self.hidden))
    }

    pub fn vae_objective(&self) -> Result<Objective, SolverError> {
        Ok(match self.objective.parse::<ObjectiveKind>()? {
            ObjectiveKind::H => Objective::H { beta: self.beta },
            ObjectiveKind::B => Objective::B {
                gamma:    self.gamma,
                capacity: CapacitySchedule::new(self.c_max, self.c_stop_iter),
            },
        })
    }

    /// Everything that can be checked before touching the filesystem.
    pub fn validate(&self) -> Result<(), SolverError> {
        self.dataset_kind()?;
        if self.image_size == 0 || self.batch_size == 0 {
            return Err(SolverError::InvalidConfig("image and batch size must be > 0".into()));
        }
        if matches!(self.solver, SolverKind::OriVae | SolverKind::Vae | SolverKind::Scan) {
            self.model.parse::<ModelVariant>()?;
            self.objective.parse::<ObjectiveKind>()?;
        }
        if self.solver == SolverKind::Scan && self.scan_z_dim != self.vae_z_dim {
            return Err(SolverError::LatentMismatch { scan: self.scan_z_dim, vae: self.vae_z_dim });
        }
        self.engine_config().validate()
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train on the default GPU device.
    pub fn execute(&self) -> Result<()> {
        self.execute_on::<TrainBackend>(&WgpuDevice::default())
    }

    /// Train on any autodiff backend.
    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 0: Seed before any network is initialised ────────────────────
        self.seed_backend::<B>(device);

        // ── Step 1: Dataset identity ──────────────────────────────────────────
        let kind = cfg.dataset_kind()?;
        tracing::info!(
            "Solver {:?} on '{}' (nc {}, {})",
            cfg.solver,
            kind.dir_name(),
            kind.channels(),
            kind.distribution()
        );

        // ── Steps 2-3: Run directories + config ───────────────────────────────
        let dirs = cfg.run_dirs(cfg.env_name());
        let checkpoints = CheckpointManager::new(&dirs.ckpt_dir)?;
        checkpoints.save_config(cfg)?;
        let sink = self.sink(&dirs)?;
        let loader = DatasetLoader::new(&cfg.dset_dir, kind, cfg.image_size);

        // ── Steps 4-7: Strategy-specific wiring, then train ───────────────────
        match cfg.solver {
            SolverKind::Dae => {
                let strategy = DaeStrategy::new(&cfg.dae_env_name, kind.distribution(), cfg.seed);
                let net = cfg.dae_net(kind).init::<B>(device);
                let source = self.image_source::<B>(&loader, kind, device)?;
                self.drive::<B, _, _, _>(strategy, net, source, checkpoints, sink, device)
            }
            SolverKind::OriVae | SolverKind::Vae => {
                let target = if cfg.solver == SolverKind::Vae {
                    ReconTarget::Perceptual(frozen_dae::<B>(cfg, kind, device)?)
                } else {
                    ReconTarget::Pixels
                };
                let strategy = VaeStrategy::new(
                    &cfg.vae_env_name,
                    kind.distribution(),
                    cfg.vae_objective()?,
                    target,
                    cfg.vae_z_dim,
                );
                let net = cfg.vae_net(kind)?.init::<B>(device);
                let source = self.image_source::<B>(&loader, kind, device)?;
                self.drive::<B, _, _, _>(strategy, net, source, checkpoints, sink, device)
            }
            SolverKind::Scan => {
                let (vae, dae) = frozen_vae::<B>(cfg, kind, device)?;
                let strategy = ScanStrategy::new(
                    &cfg.scan_env_name,
                    cfg.beta,
                    cfg.gamma,
                    cfg.scan_z_dim,
                    vae,
                    dae,
                )?;
                let dataset = loader.with_attributes()?;
                let net = ScanNetConfig::new(dataset.n_keys(), cfg.scan_z_dim)
                    .with_hidden(cfg.hidden)
                    .init::<B>(device);
                let batcher = ScanBatcher::new(kind.channels(), cfg.image_size, dataset.keys());
                let source = LoaderSource::<B, ScanBatch<B>>::shuffled::<AttributeItem, _, _>(
                    dataset,
                    batcher,
                    cfg.batch_size,
                    cfg.seed,
                    device.clone(),
                );
                self.drive::<B, _, _, _>(strategy, net, source, checkpoints, sink, device)
            }
        }
    }

    /// Seed Burn's random generator so initial weights and
    /// reparameterisation noise follow `seed`.
    fn seed_backend<B: Backend>(&self, device: &B::Device) {
        tracing::debug!("Seeding backend RNG with {}", self.config.seed);
        B::seed(device, self.config.seed);
    }

    fn sink(&self, dirs: &RunDirs) -> Result<Box<dyn MetricSink>> {
        if self.config.vis_on {
            Ok(Box::new(CsvMetricSink::new(&dirs.output_dir)?))
        } else {
            Ok(Box::new(DisabledSink))
        }
    }

    fn image_source<B: AutodiffBackend>(
        &self,
        loader: &DatasetLoader,
        kind:   DatasetKind,
        device: &B::Device,
    ) -> Result<impl BatchSource<Batch = ImageBatch<B>>> {
        let dataset = loader.images()?;
        let batcher = ImageBatcher::new(kind.channels(), self.config.image_size);
        Ok(LoaderSource::<B, ImageBatch<B>>::shuffled::<ImageItem, _, _>(
            dataset,
            batcher,
            self.config.batch_size,
            self.config.seed,
            device.clone(),
        ))
    }

    /// Build the engine around `strategy` and train to `max_iter`.
    fn drive<B, S, N, D>(
        &self,
        strategy:    S,
        net:         N,
        mut source:  D,
        checkpoints: CheckpointManager,
        sink:        Box<dyn MetricSink>,
        device:      &B::Device,
    ) -> Result<()>
    where
        B: AutodiffBackend,
        S: Strategy<B, Net = N>,
        N: AutodiffModule<B>,
        D: BatchSource<Batch = S::Batch>,
    {
        let optim = self.config.adam().init::<B, N>();
        let env = strategy.env_name().to_string();
        let mut engine = TrainingEngine::new(
            strategy,
            net,
            optim,
            self.config.engine_config(),
            checkpoints,
            sink,
            device.clone(),
        )
        .with_context(|| format!("Cannot start solver '{env}'"))?;
        engine.train(&mut source)
    }
}
