// ============================================================
// Layer 5 — Loss Functions
// ============================================================
// Pure tensor functions shared by all strategies. Every loss is
// averaged over the batch (dim 0) and summed over everything else.
//
//   reconstruction_loss  — Bernoulli NLL or Gaussian SSE
//   kl_divergence        — KL(N(mu, var) ‖ N(0, I))
//   dual_kl_divergence   — SCAN's cross-model alignment term
//
// Reference: Higgins et al. (2017) beta-VAE
//            Burgess et al. (2018) Understanding disentangling in beta-VAE
//            Higgins et al. (2018) SCAN

use burn::prelude::*;

use crate::domain::config::DecoderDistribution;

fn batch_size<B: Backend, const D: usize>(t: &Tensor<B, D>) -> usize {
    let batch = t.dims()[0];
    assert!(batch != 0, "loss computed on an empty batch");
    batch
}

/// Mean-over-batch reconstruction error of `prediction` against `target`.
///
/// Bernoulli needs every prediction strictly inside (0, 1); a
/// saturated prediction yields an infinite loss, which is not caught.
pub fn reconstruction_loss<B: Backend, const D: usize>(
    target:       Tensor<B, D>,
    prediction:   Tensor<B, D>,
    distribution: DecoderDistribution,
) -> Tensor<B, 1> {
    let batch = batch_size(&target) as f64;
    match distribution {
        DecoderDistribution::Bernoulli => {
            let log_p = prediction.clone().log();
            let log_not_p = prediction.neg().add_scalar(1.0).log();
            let not_target = target.clone().neg().add_scalar(1.0);
            (target * log_p + not_target * log_not_p)
                .sum()
                .neg()
                .div_scalar(batch)
        }
        DecoderDistribution::Gaussian => {
            (target - prediction).powf_scalar(2.0).sum().div_scalar(batch)
        }
    }
}

/// Flatten a `[batch, channels, 1, 1]` posterior to `[batch, channels]`.
pub fn flatten_posterior<B: Backend>(t: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, channels, h, w] = t.dims();
    assert!(h * w == 1, "posterior has spatial extent {h}x{w}");
    t.reshape([batch, channels])
}

/// KL divergence from N(mu, exp(logvar)) to the unit Gaussian prior.
pub fn kl_divergence<B: Backend>(mu: Tensor<B, 2>, logvar: Tensor<B, 2>) -> Tensor<B, 1> {
    batch_size(&mu);
    // -0.5 * (1 + logvar - mu² - exp(logvar))
    let klds = (logvar.clone().add_scalar(1.0) - mu.powf_scalar(2.0) - logvar.exp())
        .mul_scalar(-0.5);
    klds.mean_dim(0).sum()
}

/// Closed-form Gaussian divergence between the perceptual posterior
/// `x` and the symbolic posterior `y`:
///
/// ```text
/// 0.5 * (-1 + var_x/var_y + (mu_x - mu_y)²/var_y + logvar_y - logvar_x)
/// ```
///
/// `x` is the target and `y` the estimate pulled toward it. The
/// term is asymmetric, so the argument order matters.
pub fn dual_kl_divergence<B: Backend>(
    mu_x:     Tensor<B, 2>,
    logvar_x: Tensor<B, 2>,
    mu_y:     Tensor<B, 2>,
    logvar_y: Tensor<B, 2>,
) -> Tensor<B, 1> {
    batch_size(&mu_x);
    let var_x = logvar_x.clone().exp();
    let var_y = logvar_y.clone().exp();
    let klds = (var_x / var_y.clone()
        + (mu_x - mu_y).powf_scalar(2.0) / var_y
        + logvar_y
        - logvar_x)
        .sub_scalar(1.0)
        .mul_scalar(0.5);
    klds.mean_dim(0).sum()
}

// ─── Capacity schedule ───────────────────────────────────────────────────────
/// Linear ramp of the KL target C from 0 to `c_max`, reached at
/// `stop_iter` inclusive and held afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacitySchedule {
    pub c_max:     f64,
    pub stop_iter: usize,
}

impl CapacitySchedule {
    pub fn new(c_max: f64, stop_iter: usize) -> Self {
        Self { c_max: c_max.max(0.0), stop_iter }
    }

    pub fn at(&self, iteration: usize) -> f64 {
        if iteration >= self.stop_iter {
            return self.c_max;
        }
        (self.c_max * iteration as f64 / self.stop_iter as f64).clamp(0.0, self.c_max)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn t2(values: Vec<f32>, shape: [usize; 2]) -> Tensor<TB, 2> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn scalar(t: Tensor<TB, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_gaussian_zero_when_equal_and_positive_otherwise() {
        let x = t2(vec![0.1, 0.5, 0.9, 0.3], [2, 2]);
        assert_eq!(scalar(reconstruction_loss(x.clone(), x.clone(), DecoderDistribution::Gaussian)), 0.0);

        let y = t2(vec![0.2, 0.5, 0.7, 0.3], [2, 2]);
        let loss = scalar(reconstruction_loss(x, y, DecoderDistribution::Gaussian));
        // (0.01 + 0.04) / 2
        assert!((loss - 0.025).abs() < 1e-6);
    }

    #[test]
    fn test_bernoulli_matches_closed_form() {
        let x = t2(vec![1.0, 0.0], [1, 2]);
        let y = t2(vec![0.8, 0.25], [1, 2]);
        let loss = scalar(reconstruction_loss(x, y, DecoderDistribution::Bernoulli));
        let expected = -(0.8f64.ln() + 0.75f64.ln());
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    #[should_panic(expected = "empty batch")]
    fn test_zero_batch_is_contract_violation() {
        let x = Tensor::<TB, 2>::zeros([0, 3], &Default::default());
        let _ = reconstruction_loss(x.clone(), x, DecoderDistribution::Gaussian);
    }

    #[test]
    fn test_kl_zero_at_prior() {
        let zeros = t2(vec![0.0; 6], [2, 3]);
        assert_eq!(scalar(kl_divergence(zeros.clone(), zeros)), 0.0);
    }

    #[test]
    fn test_kl_mean_over_batch_sum_over_dims() {
        // One sample with mu = 1, logvar = 0 → 0.5 per dim; two dims → 1.0
        let mu = t2(vec![1.0, 1.0, 1.0, 1.0], [2, 2]);
        let logvar = t2(vec![0.0; 4], [2, 2]);
        assert!((scalar(kl_divergence(mu, logvar)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dual_kl_zero_for_identical_posteriors() {
        let mu = t2(vec![0.3, -1.2, 2.0, 0.5], [2, 2]);
        let logvar = t2(vec![0.1, -0.4, 0.7, 0.0], [2, 2]);
        let d = scalar(dual_kl_divergence(mu.clone(), logvar.clone(), mu, logvar));
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn test_dual_kl_is_asymmetric() {
        let (mu_a, lv_a) = (t2(vec![0.0], [1, 1]), t2(vec![0.0], [1, 1]));
        let (mu_b, lv_b) = (t2(vec![1.0], [1, 1]), t2(vec![1.0], [1, 1]));
        let ab = scalar(dual_kl_divergence(mu_a.clone(), lv_a.clone(), mu_b.clone(), lv_b.clone()));
        let ba = scalar(dual_kl_divergence(mu_b, lv_b, mu_a, lv_a));
        assert!((ab - ba).abs() > 1e-3);

        // x = (1, e), y = (0, 1): 0.5 * (-1 + e + 1 + 0 - 1)
        let expected_ba = 0.5 * (1f64.exp() + 1.0 - 1.0 - 1.0);
        assert!((ba - expected_ba).abs() < 1e-5);
    }

    #[test]
    fn test_flatten_posterior() {
        let t = Tensor::<TB, 4>::ones([2, 5, 1, 1], &Default::default());
        assert_eq!(flatten_posterior(t).dims(), [2, 5]);
    }

    #[test]
    fn test_capacity_schedule_endpoints() {
        let c = CapacitySchedule::new(25.0, 100_000);
        assert_eq!(c.at(0), 0.0);
        assert_eq!(c.at(50_000), 12.5);
        assert!(c.at(99_999) < 25.0);
        assert_eq!(c.at(100_000), 25.0);
        assert_eq!(c.at(250_000), 25.0);
    }

    #[test]
    fn test_capacity_schedule_is_monotone() {
        let c = CapacitySchedule::new(3.0, 7);
        let values: Vec<f64> = (0..20).map(|i| c.at(i)).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|v| (0.0..=3.0).contains(v)));
    }

    #[test]
    fn test_capacity_without_ramp_is_max() {
        let c = CapacitySchedule::new(5.0, 0);
        assert_eq!(c.at(0), 5.0);
    }
}
