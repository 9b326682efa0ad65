// ============================================================
// Layer 3 — Auxiliary Checkpoint State
// ============================================================
// Named visualization handles a strategy wants to survive a
// restart. The checkpoint stores the map as-is; only the
// strategy that produced it knows what the names mean.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{gather::DataGather, traits::MetricSink};

/// Opaque name → handle mapping. A missing handle is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxState(pub BTreeMap<String, Option<String>>);

impl AuxState {
    pub fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned().flatten()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

// ─── LineWindows ──────────────────────────────────────────────────────────────
/// Which metric a line window plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMetric {
    Recon,
    Kld,
    Relv,
    Mu,
    Var,
}

impl LineMetric {
    /// Key under which the window handle is checkpointed.
    pub fn key(self) -> &'static str {
        match self {
            Self::Recon => "recon",
            Self::Kld   => "kld",
            Self::Relv  => "relv",
            Self::Mu    => "mu",
            Self::Var   => "var",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Recon => "reconstruction loss",
            Self::Kld   => "kl divergence",
            Self::Relv  => "relevance",
            Self::Mu    => "posterior mean",
            Self::Var   => "posterior variance",
        }
    }

    fn is_latent(self) -> bool {
        matches!(self, Self::Mu | Self::Var)
    }
}

/// The set of line windows one strategy draws.
#[derive(Debug, Clone)]
pub struct LineWindows {
    metrics: Vec<LineMetric>,
    handles: BTreeMap<&'static str, Option<String>>,
}

impl LineWindows {
    pub fn new(metrics: &[LineMetric]) -> Self {
        let handles = metrics.iter().map(|m| (m.key(), None)).collect();
        Self { metrics: metrics.to_vec(), handles }
    }

    pub fn handle(&self, metric: LineMetric) -> Option<&str> {
        self.handles.get(metric.key()).and_then(|h| h.as_deref())
    }

    pub fn snapshot(&self) -> AuxState {
        AuxState(
            self.handles
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    pub fn restore(&mut self, aux: &AuxState) {
        for (key, handle) in self.handles.iter_mut() {
            *handle = aux.get(key);
        }
    }

    /// Push every gathered column this strategy plots to the sink.
    ///
    /// `z_dim` sizes the `z_j` legend of the latent windows.
    pub fn update(
        &mut self,
        sink:   &mut dyn MetricSink,
        env:    &str,
        gather: &DataGather,
        z_dim:  usize,
    ) -> anyhow::Result<()> {
        if gather.is_empty() {
            return Ok(());
        }
        let scalar_legend = vec![String::new()];
        let latent_legend: Vec<String> = (0..z_dim).map(|j| format!("z_{j}")).collect();

        for metric in self.metrics.clone() {
            let rows = match metric {
                LineMetric::Recon => DataGather::scalar_rows(&gather.recon_loss),
                LineMetric::Kld   => DataGather::scalar_rows(&gather.kld),
                LineMetric::Relv  => DataGather::scalar_rows(&gather.relv),
                LineMetric::Mu    => gather.mu.clone(),
                LineMetric::Var   => gather.var.clone(),
            };
            let legend = if metric.is_latent() { &latent_legend } else { &scalar_legend };
            let handle = sink.update_lines(
                env,
                self.handle(metric),
                metric.title(),
                legend,
                &gather.iter,
                &rows,
            )?;
            self.handles.insert(metric.key(), Some(handle));
        }
        Ok(())
    }
}
