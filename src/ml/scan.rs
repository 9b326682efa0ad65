// ============================================================
// Layer 5 — SCAN Strategy
// ============================================================
// Grounds attribute vectors ("symbols") in the latent space of a
// frozen beta-VAE.
//
//   y ──SCAN──▶ (mu_y, logvar_y) ──▶ ŷ
//   x ──VAE (frozen)──▶ (mu_x, logvar_x)       detached target
//
//   loss = recon_bernoulli(y, ŷ)
//        + beta  · KL(mu_y, logvar_y)
//        + gamma · dual_KL(x ‖ y)
//
// Inference helpers cross the two modalities:
//
//   img2sym:  x ──VAE mu──▶ SCAN.decode ──▶ top-k attribute keys
//   sym2img:  y ──SCAN mu──▶ VAE.decode ──▶ DAE ──▶ image
//
// Both are reported as text at every checkpoint once a batch has
// been gathered: top-k attributes for a few training images, and
// image statistics for each attribute decoded on its own.
//
// Reference: Higgins et al. (2018) SCAN: Learning Hierarchical
//            Compositional Visual Concepts

use std::sync::Arc;

use anyhow::Result;
use burn::{prelude::*, tensor::backend::AutodiffBackend};

use crate::data::batcher::ScanBatch;
use crate::domain::{
    aux_state::{AuxState, LineMetric, LineWindows},
    config::DecoderDistribution,
    error::SolverError,
    gather::{DataGather, GatherSample},
    traits::MetricSink,
};
use crate::ml::{
    frozen::Frozen,
    loss::{dual_kl_divergence, kl_divergence, reconstruction_loss},
    model::{BetaVaeNet, DaeNet, ScanNet},
    trainer::{tensor_values, StepContext, StepOutput, Strategy},
};

/// Attributes listed per image in the img2sym report.
pub const REPORT_TOP_K: usize = 5;
/// Images kept from the last gathered batch for the img2sym report.
const REPORT_IMAGES: usize = 8;

pub struct ScanStrategy<B: Backend> {
    env_name:    String,
    beta:        f64,
    gamma:       f64,
    z_dim:       usize,
    vae:         Frozen<BetaVaeNet<B>>,
    dae:         Frozen<DaeNet<B>>,
    keys:        Option<Arc<Vec<String>>>,
    last_images: Option<Tensor<B, 4>>,
    windows:     LineWindows,
}

impl<B: Backend> ScanStrategy<B> {
    /// Fails when SCAN's latent size differs from the VAE's.
    pub fn new(
        env_name: impl Into<String>,
        beta:     f64,
        gamma:    f64,
        z_dim:    usize,
        vae:      Frozen<BetaVaeNet<B>>,
        dae:      Frozen<DaeNet<B>>,
    ) -> Result<Self, SolverError> {
        if vae.z_dim != z_dim {
            return Err(SolverError::LatentMismatch { scan: z_dim, vae: vae.z_dim });
        }
        Ok(Self {
            env_name: env_name.into(),
            beta,
            gamma,
            z_dim,
            vae,
            dae,
            keys: None,
            last_images: None,
            windows: LineWindows::new(&[
                LineMetric::Recon,
                LineMetric::Kld,
                LineMetric::Relv,
                LineMetric::Mu,
                LineMetric::Var,
            ]),
        })
    }

    /// Attribute names seen in the first batch, if any batch was seen.
    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref().map(Vec::as_slice)
    }

    /// The `top_k` most probable attributes for each image.
    pub fn img_to_symbols(
        &self,
        net:    &ScanNet<B>,
        images: Tensor<B, 4>,
        top_k:  usize,
    ) -> Result<Vec<Vec<(String, f64)>>> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("attribute keys are unknown before the first batch"))?;

        let (mu_x, _) = self.vae.posterior(images);
        let probs = net.decode(mu_x.detach());
        let [batch, n_symbols] = probs.dims();
        let values = tensor_values(probs)?;

        Ok((0..batch)
            .map(|row| {
                let row_probs = &values[row * n_symbols..(row + 1) * n_symbols];
                let mut ranked: Vec<(usize, f64)> = row_probs.iter().copied().enumerate().collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
                ranked
                    .into_iter()
                    .take(top_k)
                    .map(|(i, p)| (keys.get(i).cloned().unwrap_or_else(|| format!("#{i}")), p))
                    .collect()
            })
            .collect())
    }

    /// Images imagined for each symbol vector.
    pub fn symbols_to_images(&self, net: &ScanNet<B>, symbols: Tensor<B, 2>) -> Tensor<B, 4> {
        let (mu_y, _) = net.posterior(symbols);
        self.dae.forward(self.vae.decode(mu_y))
    }

    fn img2sym_report(&self, net: &ScanNet<B>, images: Tensor<B, 4>, iteration: usize) -> Result<String> {
        let rows = self.img_to_symbols(net, images, REPORT_TOP_K)?;
        let mut body = format!("img2sym at iteration {iteration}\n");
        for (i, row) in rows.iter().enumerate() {
            let attrs: Vec<String> = row.iter().map(|(k, p)| format!("{k}:{p:.3}")).collect();
            body.push_str(&format!("[{i}] {}\n", attrs.join(" ")));
        }
        Ok(body)
    }

    /// One row per attribute: intensity statistics of the image
    /// imagined from that attribute alone.
    fn sym2img_report(&self, net: &ScanNet<B>, device: &B::Device, iteration: usize) -> Result<String> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("attribute keys are unknown before the first batch"))?;

        let images = self.symbols_to_images(net, Tensor::eye(keys.len(), device));
        let [n, ..] = images.dims();
        let pixels = tensor_values(images.flatten::<2>(1, 3))?;
        let per_image = pixels.len() / n.max(1);

        let mut body = format!("sym2img at iteration {iteration}\n");
        for (key, image) in keys.iter().zip(pixels.chunks(per_image.max(1))) {
            let mean = image.iter().sum::<f64>() / image.len() as f64;
            let (lo, hi) = image
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            body.push_str(&format!("{key:<20} mean:{mean:.3} min:{lo:.3} max:{hi:.3}\n"));
        }
        Ok(body)
    }
}

impl<B: AutodiffBackend> Strategy<B> for ScanStrategy<B> {
    type Net = ScanNet<B>;
    type Batch = ScanBatch<B>;

    fn env_name(&self) -> &str {
        &self.env_name
    }

    fn compute_loss(
        &mut self,
        net:   &ScanNet<B>,
        batch: ScanBatch<B>,
        ctx:   StepContext,
    ) -> Result<StepOutput<B>> {
        if self.keys.is_none() {
            tracing::debug!("[{}] captured {} attribute keys", self.env_name, batch.keys.len());
            self.keys = Some(Arc::clone(&batch.keys));
        }

        let out = net.forward(batch.symbols.clone());
        let (mu_x, logvar_x) = self.vae.posterior(batch.images.clone());
        let (mu_x, logvar_x) = (mu_x.detach(), logvar_x.detach());

        let recon = reconstruction_loss(batch.symbols, out.recon, DecoderDistribution::Bernoulli);
        let kld = kl_divergence(out.mu.clone(), out.logvar.clone());
        let relv = dual_kl_divergence(mu_x, logvar_x, out.mu.clone(), out.logvar.clone());
        let loss = recon.clone() + kld.clone().mul_scalar(self.beta) + relv.clone().mul_scalar(self.gamma);

        let sample = if ctx.gather {
            let [batch_size, ..] = batch.images.dims();
            let kept = batch_size.min(REPORT_IMAGES);
            self.last_images = Some(batch.images.slice([0..kept]).detach());
            Some(GatherSample {
                iteration:  ctx.iteration,
                recon_loss: recon.into_scalar().elem::<f64>(),
                kld:        Some(kld.into_scalar().elem::<f64>()),
                relv:       Some(relv.into_scalar().elem::<f64>()),
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
        net:       &ScanNet<B>,
        gather:    &DataGather,
        sink:      &mut dyn MetricSink,
        iteration: usize,
    ) -> Result<()> {
        let env = format!("{}_lines", self.env_name);
        self.windows.update(sink, &env, gather, self.z_dim)?;

        if let (Some(_), Some(images)) = (&self.keys, self.last_images.clone()) {
            let device = images.device();
            let title = format!("iter:{iteration}");

            let body = self.img2sym_report(net, images, iteration)?;
            sink.text(&format!("{}_img2sym", self.env_name), &title, &body)?;

            let body = self.sym2img_report(net, &device, iteration)?;
            sink.text(&format!("{}_sym2img", self.env_name), &title, &body)?;
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::infra::metrics::CsvMetricSink;
    use crate::ml::model::{BetaVaeNetConfig, DaeNetConfig, ScanNetConfig};

    type TB = Autodiff<NdArray>;

    const Z: usize = 3;

    fn upstream() -> (Frozen<BetaVaeNet<TB>>, Frozen<DaeNet<TB>>) {
        let device = Default::default();
        let vae = BetaVaeNetConfig::new(1, 4, Z).with_hidden(8).init::<TB>(&device);
        let dae = DaeNetConfig::new(1, 4, 5).with_hidden(8).init::<TB>(&device);
        (Frozen::freeze::<TB>(vae), Frozen::freeze::<TB>(dae))
    }

    fn batch() -> ScanBatch<TB> {
        let device = Default::default();
        let pixels: Vec<f32> = (0..32).map(|i| (i % 4) as f32 / 3.0).collect();
        ScanBatch {
            images:  Tensor::from_data(TensorData::new(pixels, [2, 1, 4, 4]), &device),
            symbols: Tensor::from_data(
                TensorData::new(vec![1.0f32, 0.0, 1.0, 0.0, 1.0, 0.0], [2, 3]),
                &device,
            ),
            keys:    Arc::new(vec!["Smiling".into(), "Male".into(), "Young".into()]),
        }
    }

    fn scan_net() -> ScanNet<TB> {
        ScanNetConfig::new(3, Z).with_hidden(8).init(&Default::default())
    }

    #[test]
    fn test_latent_mismatch_is_rejected() {
        let (vae, dae) = upstream();
        let err = ScanStrategy::<TB>::new("scan", 1.0, 10.0, Z + 1, vae, dae).err().unwrap();
        assert!(matches!(err, SolverError::LatentMismatch { scan: 4, vae: 3 }));
    }

    #[test]
    fn test_loss_composes_three_terms() {
        let (vae, dae) = upstream();
        let mut strategy = ScanStrategy::<TB>::new("scan", 2.0, 10.0, Z, vae, dae).unwrap();
        assert!(strategy.keys().is_none());

        let ctx = StepContext { iteration: 1, gather: true };
        let out = strategy.compute_loss(&scan_net(), batch(), ctx).unwrap();
        let loss = out.loss.into_scalar().elem::<f64>();
        let s = out.sample.unwrap();
        let (kld, relv) = (s.kld.unwrap(), s.relv.unwrap());

        assert!(relv >= -1e-6);
        let expected = s.recon_loss + 2.0 * kld + 10.0 * relv;
        assert!((loss - expected).abs() <= 1e-4 * (1.0 + expected.abs()));
        assert_eq!(strategy.keys().unwrap(), ["Smiling", "Male", "Young"]);
    }

    #[test]
    fn test_gradients_stop_at_frozen_vae() {
        let (vae, dae) = upstream();
        let mut strategy = ScanStrategy::<TB>::new("scan", 1.0, 10.0, Z, vae.clone(), dae).unwrap();
        let net = scan_net();
        let ctx = StepContext { iteration: 1, gather: false };
        let grads = strategy.compute_loss(&net, batch(), ctx).unwrap().loss.backward();

        assert!(net.to_distribution.weight.val().grad(&grads).is_some());
        assert!(vae.to_distribution.weight.val().grad(&grads).is_none());
    }

    #[test]
    fn test_cross_modal_helpers() {
        let (vae, dae) = upstream();
        let mut strategy = ScanStrategy::<TB>::new("scan", 1.0, 10.0, Z, vae, dae).unwrap();
        let net = scan_net();
        let b = batch();
        assert!(strategy.img_to_symbols(&net, b.images.clone(), 2).is_err());

        let ctx = StepContext { iteration: 1, gather: false };
        strategy.compute_loss(&net, b.clone(), ctx).unwrap();

        let rows = strategy.img_to_symbols(&net, b.images, 2).unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.len(), 2);
            assert!(row[0].1 >= row[1].1);
            assert!(["Smiling", "Male", "Young"].contains(&row[0].0.as_str()));
        }

        let images = strategy.symbols_to_images(&net, b.symbols);
        assert_eq!(images.dims(), [2, 1, 4, 4]);
    }

    #[test]
    fn test_report_writes_cross_modal_text() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = CsvMetricSink::new(tmp.path()).unwrap();
        let (vae, dae) = upstream();
        let mut strategy = ScanStrategy::<TB>::new("scan", 1.0, 10.0, Z, vae, dae).unwrap();
        let net = scan_net();

        let mut gather = DataGather::new();
        let ctx = StepContext { iteration: 4, gather: true };
        let out = strategy.compute_loss(&net, batch(), ctx).unwrap();
        gather.insert(out.sample.unwrap());
        strategy.report(&net, &gather, &mut sink, 4).unwrap();

        assert!(tmp.path().join("scan_lines").join("relevance.csv").is_file());
        let report = std::fs::read_to_string(tmp.path().join("scan_img2sym").join("iter_4.txt")).unwrap();
        assert!(report.starts_with("img2sym at iteration 4"));
        let report = std::fs::read_to_string(tmp.path().join("scan_sym2img").join("iter_4.txt")).unwrap();
        assert!(report.starts_with("sym2img at iteration 4"));
        for key in ["Smiling", "Male", "Young"] {
            assert!(report.lines().any(|l| l.starts_with(key) && l.contains("mean:")));
        }
        assert!(strategy.snapshot_aux_state().get("relv").is_some());
    }
}
