// ============================================================
// Layer 3 — Data Gatherer
// ============================================================
// In-process buffer of per-iteration training scalars, drained
// every time the metric sink is updated. One column per known
// metric, so each strategy can only record what the schema has.
//
// The buffer is never checkpointed; only the sink's window
// handles survive a restart.

/// One gathered row. Metrics a strategy does not produce stay None.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatherSample {
    pub iteration:  usize,
    pub recon_loss: f64,
    pub kld:        Option<f64>,
    /// Dual KL between SCAN and the VAE posterior
    pub relv:       Option<f64>,
    /// Batch mean of the posterior mean, per latent dimension
    pub mu:         Option<Vec<f64>>,
    /// Batch mean of the posterior variance, per latent dimension
    pub var:        Option<Vec<f64>>,
}

/// Append-only columns of gathered samples.
#[derive(Debug, Clone, Default)]
pub struct DataGather {
    pub iter:       Vec<usize>,
    pub recon_loss: Vec<f64>,
    pub kld:        Vec<f64>,
    pub relv:       Vec<f64>,
    pub mu:         Vec<Vec<f64>>,
    pub var:        Vec<Vec<f64>>,
}

impl DataGather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sample: GatherSample) {
        self.iter.push(sample.iteration);
        self.recon_loss.push(sample.recon_loss);
        if let Some(kld) = sample.kld {
            self.kld.push(kld);
        }
        if let Some(relv) = sample.relv {
            self.relv.push(relv);
        }
        if let Some(mu) = sample.mu {
            self.mu.push(mu);
        }
        if let Some(var) = sample.var {
            self.var.push(var);
        }
    }

    /// Drop all history.
    pub fn flush(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.iter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iter.is_empty()
    }

    /// Scalar column as single-value rows, the shape the sink expects.
    pub fn scalar_rows(column: &[f64]) -> Vec<Vec<f64>> {
        column.iter().map(|v| vec![*v]).collect()
    }
}
