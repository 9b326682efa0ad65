// ============================================================
// Layer 5 — Training Engine
// ============================================================
// One engine drives every model family. What differs per family
// lives behind the Strategy trait: how a batch becomes a loss,
// and which visualization handles must survive a restart.
//
// Lifecycle:
//   Idle ──train()──▶ Running ⇄ Checkpointing ──max_iter──▶ Finished
//
// Per step:
//   1. pull a batch (blocks until the source yields one)
//   2. strategy computes the loss for step `iteration + 1`
//   3. backward pass + Adam step on the owned network
//   4. commit the iteration counter
//   5. every `gather_every` steps: record metrics (vis on)
//   6. every `checkpoint_every` steps: report, flush, save
//
// The counter is committed only after the optimizer step, so a
// failed step never leaves the counter ahead of the parameters.
//
// Reference: Burn Book §5 (Training), Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::{
    aux_state::AuxState,
    error::SolverError,
    gather::{DataGather, GatherSample},
    traits::{BatchSource, MetricSink},
};
use crate::infra::checkpoint::{CheckpointManager, LATEST};

/// Visualization envs wiped when a run starts from scratch.
pub const RUN_ENVS: [&str; 5] = ["lines", "reconstruction", "traverse", "img2sym", "sym2img"];

/// Copy a tensor's values out as f64, row-major.
pub fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| anyhow::anyhow!("reading tensor values: {e:?}"))
}

// ─── Strategy ─────────────────────────────────────────────────────────────────
/// What the engine tells a strategy about the step being computed.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    /// 1-based index of the step being computed
    pub iteration: usize,
    /// Whether the engine will record this step's metrics
    pub gather:    bool,
}

/// Loss of one step plus the metrics it produced.
pub struct StepOutput<B: Backend> {
    pub loss:   Tensor<B, 1>,
    pub sample: Option<GatherSample>,
}

/// A model family: how a batch turns into a scalar loss.
pub trait Strategy<B: AutodiffBackend> {
    /// The network this strategy trains
    type Net: AutodiffModule<B>;
    type Batch;

    /// Run identity; prefixes every visualization env.
    fn env_name(&self) -> &str;

    fn compute_loss(
        &mut self,
        net:   &Self::Net,
        batch: Self::Batch,
        ctx:   StepContext,
    ) -> Result<StepOutput<B>>;

    fn snapshot_aux_state(&self) -> AuxState;

    fn restore_aux_state(&mut self, aux: &AuxState);

    /// Push gathered metrics to the sink.
    fn report(
        &mut self,
        net:       &Self::Net,
        gather:    &DataGather,
        sink:      &mut dyn MetricSink,
        iteration: usize,
    ) -> Result<()>;
}

// ─── Engine configuration ─────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_iter:         usize,
    pub checkpoint_every: usize,
    pub gather_every:     usize,
    pub lr:               f64,
    pub vis_on:           bool,
    /// Name of the checkpoint to resume from. Read once, never written.
    pub ckpt_name:        String,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.checkpoint_every == 0 {
            return Err(SolverError::InvalidConfig("checkpoint interval must be > 0".into()));
        }
        if self.gather_every == 0 {
            return Err(SolverError::InvalidConfig("gather interval must be > 0".into()));
        }
        if self.ckpt_name.is_empty() {
            return Err(SolverError::InvalidConfig("checkpoint name is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Checkpointing,
    Finished,
}

// ─── TrainingEngine ───────────────────────────────────────────────────────────
pub struct TrainingEngine<B, S, O>
where
    B: AutodiffBackend,
    S: Strategy<B>,
    O: Optimizer<S::Net, B>,
{
    strategy:    S,
    net:         S::Net,
    optim:       O,
    iteration:   usize,
    state:       EngineState,
    config:      EngineConfig,
    checkpoints: CheckpointManager,
    sink:        Box<dyn MetricSink>,
    gather:      DataGather,
}

impl<B, S, O> TrainingEngine<B, S, O>
where
    B: AutodiffBackend,
    S: Strategy<B>,
    O: Optimizer<S::Net, B>,
{
    /// Build the engine and resume from `config.ckpt_name` if it exists.
    ///
    /// A missing checkpoint starts from iteration 0 and, with
    /// visualization on, wipes the run's envs. An unreadable
    /// checkpoint is an error.
    pub fn new(
        mut strategy: S,
        net:          S::Net,
        optim:        O,
        config:       EngineConfig,
        checkpoints:  CheckpointManager,
        mut sink:     Box<dyn MetricSink>,
        device:       B::Device,
    ) -> Result<Self> {
        config.validate()?;

        let (net, optim, iteration) = match checkpoints.read(&config.ckpt_name)? {
            Some(stored) => {
                let net = stored.restore_model::<B, S::Net>(net, &device)?;
                let optim = stored.restore_optimizer::<B, S::Net, O>(optim, &device)?;
                strategy.restore_aux_state(&stored.aux_state);
                tracing::info!(
                    "=> loaded checkpoint '{}' (iter {})",
                    stored.path.display(),
                    stored.iteration
                );
                (net, optim, stored.iteration)
            }
            None => {
                tracing::info!(
                    "=> no checkpoint found at '{}'",
                    checkpoints.path(&config.ckpt_name).display()
                );
                if config.vis_on {
                    for key in RUN_ENVS {
                        sink.delete_env(&format!("{}_{key}", strategy.env_name()))?;
                    }
                }
                (net, optim, 0)
            }
        };

        Ok(Self {
            strategy,
            net,
            optim,
            iteration,
            state: EngineState::Idle,
            config,
            checkpoints,
            sink,
            gather: DataGather::new(),
        })
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn net(&self) -> &S::Net {
        &self.net
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut S {
        &mut self.strategy
    }

    pub fn gather(&self) -> &DataGather {
        &self.gather
    }

    /// Hand the trained network back, e.g. to freeze it.
    pub fn into_net(self) -> S::Net {
        self.net
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            tracing::debug!("[{}] {:?} → {:?}", self.strategy.env_name(), self.state, state);
            self.state = state;
        }
    }

    // ── Checkpoint save ───────────────────────────────────────────────────────
    /// Save under the current iteration and under [`LATEST`].
    pub fn save_checkpoint(&mut self) -> Result<()> {
        self.set_state(EngineState::Checkpointing);
        let aux = self.strategy.snapshot_aux_state();
        for name in [self.iteration.to_string(), LATEST.to_string()] {
            self.checkpoints
                .save::<B, S::Net, O>(&name, self.iteration, &aux, &self.net, &self.optim)?;
        }
        self.set_state(EngineState::Running);
        Ok(())
    }

    // ── One optimisation step ─────────────────────────────────────────────────
    /// Compute the loss for the next step, apply one Adam update and
    /// advance the counter. Returns the scalar loss before the update.
    pub fn step(&mut self, batch: S::Batch) -> Result<f64> {
        let iteration = self.iteration + 1;
        let ctx = StepContext {
            iteration,
            gather: self.config.vis_on && iteration % self.config.gather_every == 0,
        };

        let output = self.strategy.compute_loss(&self.net, batch, ctx)?;
        let loss_value: f64 = output.loss.clone().into_scalar().elem::<f64>();

        // Backward pass + Adam update
        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.net);
        self.net = self.optim.step(self.config.lr, self.net.clone(), grads);
        self.iteration = iteration;

        if let Some(sample) = output.sample.filter(|_| ctx.gather) {
            self.gather.insert(sample);
        }
        Ok(loss_value)
    }

    fn report(&mut self) -> Result<()> {
        if self.config.vis_on {
            self.strategy
                .report(&self.net, &self.gather, self.sink.as_mut(), self.iteration)?;
            self.gather.flush();
        }
        Ok(())
    }

    // ── Training loop ─────────────────────────────────────────────────────────
    /// Train until the iteration counter reaches `max_iter`.
    pub fn train<D>(&mut self, data: &mut D) -> Result<()>
    where
        D: BatchSource<Batch = S::Batch>,
    {
        self.set_state(EngineState::Running);

        let pbar = ProgressBar::new(self.config.max_iter as u64);
        pbar.set_style(
            ProgressStyle::with_template("{prefix} [{bar:40}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pbar.set_prefix(self.strategy.env_name().to_string());
        pbar.set_position(self.iteration as u64);

        while self.iteration < self.config.max_iter {
            let mut pulled = false;
            for batch in data.epoch() {
                if self.iteration >= self.config.max_iter {
                    break;
                }
                pulled = true;

                let loss = self.step(batch)?;
                pbar.inc(1);

                if self.iteration % self.config.checkpoint_every == 0 {
                    tracing::info!("[{}] loss:{:.3}", self.iteration, loss);
                    self.report()?;
                    self.save_checkpoint()?;
                    pbar.println(format!("Saved checkpoint(iter:{})", self.iteration));
                }
            }
            if !pulled {
                return Err(SolverError::EmptyDataSource.into());
            }
        }

        pbar.finish_and_clear();
        self.set_state(EngineState::Finished);
        tracing::info!("[{}] Training Finished", self.strategy.env_name());
        Ok(())
    }
}
