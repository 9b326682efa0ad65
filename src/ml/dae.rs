// ============================================================
// Layer 5 — Denoising Autoencoder Strategy
// ============================================================
// Learns a perceptual feature space by reconstructing clean
// images from occluded copies.
//
//   x ──occlude──▶ x̃ ──DAE──▶ x̂        loss = recon(x, x̂)
//
// The occluded copy is rebuilt each step from the run seed and
// the step index. The DAE keeps no other state between steps.

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
    loss::reconstruction_loss,
    model::DaeNet,
    occlusion::{random_occluding, step_rng},
    trainer::{StepContext, StepOutput, Strategy},
};

pub struct DaeStrategy {
    env_name:     String,
    distribution: DecoderDistribution,
    seed:         u64,
    windows:      LineWindows,
}

impl DaeStrategy {
    pub fn new(env_name: impl Into<String>, distribution: DecoderDistribution, seed: u64) -> Self {
        Self {
            env_name: env_name.into(),
            distribution,
            seed,
            windows: LineWindows::new(&[LineMetric::Recon]),
        }
    }

    /// Reconstruction loss of `net` restoring `original` from `occluded`.
    pub fn loss_on<B: Backend>(
        &self,
        net:      &DaeNet<B>,
        original: Tensor<B, 4>,
        occluded: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        reconstruction_loss(original, net.forward(occluded), self.distribution)
    }
}

impl<B: AutodiffBackend> Strategy<B> for DaeStrategy {
    type Net = DaeNet<B>;
    type Batch = ImageBatch<B>;

    fn env_name(&self) -> &str {
        &self.env_name
    }

    fn compute_loss(
        &mut self,
        net:   &DaeNet<B>,
        batch: ImageBatch<B>,
        ctx:   StepContext,
    ) -> Result<StepOutput<B>> {
        let mut rng = step_rng(self.seed, ctx.iteration);
        let (occluded, _) = random_occluding(&mut rng, batch.images.clone());
        let loss = self.loss_on(net, batch.images, occluded);

        let sample = ctx.gather.then(|| GatherSample {
            iteration:  ctx.iteration,
            recon_loss: loss.clone().into_scalar().elem::<f64>(),
            ..Default::default()
        });
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
        _net:       &DaeNet<B>,
        gather:     &DataGather,
        sink:       &mut dyn MetricSink,
        _iteration: usize,
    ) -> Result<()> {
        let env = format!("{}_lines", self.env_name);
        self.windows.update(sink, &env, gather, 0)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::{AdamConfig, GradientsParams, Optimizer},
    };

    use crate::ml::model::DaeNetConfig;

    type TB = Autodiff<NdArray>;

    fn batch(device: &<TB as Backend>::Device) -> ImageBatch<TB> {
        let pixels: Vec<f32> = (0..32).map(|i| (i % 5) as f32 / 4.0).collect();
        ImageBatch {
            images: Tensor::from_data(TensorData::new(pixels, [2, 1, 4, 4]), device),
        }
    }

    #[test]
    fn test_one_step_changes_loss() {
        let device = Default::default();
        let mut net = DaeNetConfig::new(1, 4, 3).with_hidden(8).init::<TB>(&device);
        let mut optim = AdamConfig::new().init::<TB, DaeNet<TB>>();
        let mut strategy = DaeStrategy::new("dae", DecoderDistribution::Gaussian, 1);
        let ctx = StepContext { iteration: 1, gather: true };

        let out = Strategy::<TB>::compute_loss(&mut strategy, &net, batch(&device), ctx).unwrap();
        let before = out.loss.clone().into_scalar().elem::<f64>();
        assert!(before.is_finite() && before >= 0.0);
        assert_eq!(out.sample.unwrap().recon_loss, before);

        let grads = GradientsParams::from_grads(out.loss.backward(), &net);
        net = optim.step(1e-2, net, grads);

        // Same step index, same occlusion masks: only the weights differ.
        let out = Strategy::<TB>::compute_loss(&mut strategy, &net, batch(&device), ctx).unwrap();
        let after = out.loss.into_scalar().elem::<f64>();
        assert!(after.is_finite() && after >= 0.0);
        assert_ne!(before, after);
    }

    #[test]
    fn test_no_sample_when_not_gathering() {
        let device = Default::default();
        let net = DaeNetConfig::new(1, 4, 3).with_hidden(8).init::<TB>(&device);
        let mut strategy = DaeStrategy::new("dae", DecoderDistribution::Bernoulli, 1);
        let ctx = StepContext { iteration: 3, gather: false };
        let out = Strategy::<TB>::compute_loss(&mut strategy, &net, batch(&device), ctx).unwrap();
        assert!(out.sample.is_none());
    }
}
