// ============================================================
// Layer 5 — Beta-VAE Strategy
// ============================================================
// Learns a disentangled latent space over images.
//
//   x ──encode──▶ (mu, logvar) ──sample──▶ z ──decode──▶ x̂
//
//   loss = recon + regularizer(KL)
//
//   objective H:  beta · KL
//   objective B:  gamma · |KL − C(iteration)|
//
// The perceptual variant ("vae") compares images in the feature
// space of a frozen DAE instead of pixel space ("ori-vae"):
//
//   recon = recon(DAE.encode(x), DAE.encode(x̂))
//
// Gradients flow through the frozen DAE into the decoder; the DAE
// weights themselves never change.

use anyhow::Result;
use burn::{prelude::*, tensor::backend::AutodiffBackend};

use crate::data::batcher::ImageBatch;
use crate::domain::{
    aux_state::{AuxState, LineMetric, LineWindows},
    config::DecoderDistribution,
    gather::{DataGather, GatherSample},
    traits::MetricSink,
};
use crate::ml::{
    frozen::Frozen,
    loss::{kl_divergence, reconstruction_loss, CapacitySchedule},
    model::{BetaVaeNet, DaeNet},
    trainer::{tensor_values, StepContext, StepOutput, Strategy},
};

// ─── Objective ────────────────────────────────────────────────────────────────
/// How the KL term enters the loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// Higgins et al.: fixed weight on the KL
    H { beta: f64 },
    /// Burgess et al.: pull the KL toward a growing capacity
    B { gamma: f64, capacity: CapacitySchedule },
}

impl Objective {
    pub fn regularizer<B: Backend>(&self, kld: Tensor<B, 1>, iteration: usize) -> Tensor<B, 1> {
        match *self {
            Self::H { beta } => kld.mul_scalar(beta),
            Self::B { gamma, capacity } => {
                kld.sub_scalar(capacity.at(iteration)).abs().mul_scalar(gamma)
            }
        }
    }
}

// ─── Reconstruction target ────────────────────────────────────────────────────
/// What the reconstruction is compared in.
#[derive(Debug, Clone)]
pub enum ReconTarget<B: Backend> {
    Pixels,
    Perceptual(Frozen<DaeNet<B>>),
}

// ─── VaeStrategy ──────────────────────────────────────────────────────────────
pub struct VaeStrategy<B: Backend> {
    env_name:     String,
    distribution: DecoderDistribution,
    objective:    Objective,
    target:       ReconTarget<B>,
    z_dim:        usize,
    windows:      LineWindows,
}

impl<B: Backend> VaeStrategy<B> {
    pub fn new(
        env_name:     impl Into<String>,
        distribution: DecoderDistribution,
        objective:    Objective,
        target:       ReconTarget<B>,
        z_dim:        usize,
    ) -> Self {
        Self {
            env_name: env_name.into(),
            distribution,
            objective,
            target,
            z_dim,
            windows: LineWindows::new(&[
                LineMetric::Recon,
                LineMetric::Kld,
                LineMetric::Mu,
                LineMetric::Var,
            ]),
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn is_perceptual(&self) -> bool {
        matches!(self.target, ReconTarget::Perceptual(_))
    }

    fn recon_loss(&self, images: Tensor<B, 4>, recon: Tensor<B, 4>) -> Tensor<B, 1> {
        match &self.target {
            ReconTarget::Pixels => reconstruction_loss(images, recon, self.distribution),
            ReconTarget::Perceptual(dae) => {
                reconstruction_loss(dae.encode(images), dae.encode(recon), self.distribution)
            }
        }
    }
}

impl<B: AutodiffBackend> Strategy<B> for VaeStrategy<B> {
    type Net = BetaVaeNet<B>;
    type Batch = ImageBatch<B>;

    fn env_name(&self) -> &str {
        &self.env_name
    }

    fn compute_loss(
        &mut self,
        net:   &BetaVaeNet<B>,
        batch: ImageBatch<B>,
        ctx:   StepContext,
    ) -> Result<StepOutput<B>> {
        let out = net.forward(batch.images.clone());
        let recon = self.recon_loss(batch.images, out.recon);
        let kld = kl_divergence(out.mu.clone(), out.logvar.clone());
        let loss = recon.clone() + self.objective.regularizer(kld.clone(), ctx.iteration);

        let sample = if ctx.gather {
            Some(GatherSample {
                iteration:  ctx.iteration,
                recon_loss: recon.into_scalar().elem::<f64>(),
                kld:        Some(kld.into_scalar().elem::<f64>()),
                relv:       None,
                mu:         Some(tensor_values(out.mu.mean_dim(0))?),
                var:        Some(tensor_values(out.logvar.exp().mean_dim(0))?),
            })
        } else {
            None
        };
        Ok(StepOutput { loss, sample })
    }

    fn snapshot_aux_state(&self) -> AuxState {
        self.windows.snapshot()
    }

    fn restore_aux_state(&mut self, aux: &AuxState) {
        self.windows.restore(aux);
    }

    fn report(
        &mut self,
        _net:       &BetaVaeNet<B>,
        gather:     &DataGather,
        sink:       &mut dyn MetricSink,
        _iteration: usize,
    ) -> Result<()> {
        let env = format!("{}_lines", self.env_name);
        self.windows.update(sink, &env, gather, self.z_dim)
    }
}
