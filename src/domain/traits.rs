// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The solver only talks to its collaborators through these:
//
//   BatchSource — restartable sequence of training batches
//   MetricSink  — periodic reporting of gathered metrics
//
// Neither trait mentions Burn; a batch is whatever the strategy
// consuming it says it is.

use anyhow::Result;

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// A restartable, finite sequence of batches.
///
/// Each call to `epoch` starts a fresh pass. The training engine
/// keeps calling it until the iteration budget is spent, so a
/// finite source is cycled.
pub trait BatchSource {
    type Batch;

    /// Begin a new pass over the data.
    fn epoch(&mut self) -> Box<dyn Iterator<Item = Self::Batch> + '_>;
}

// ─── MetricSink ───────────────────────────────────────────────────────────────
/// Receives named line plots and text reports keyed by iteration.
///
/// A sink hands back an opaque window handle for every line plot.
/// Passing that handle on the next update appends to the same
/// window. The handles are what get checkpointed.
pub trait MetricSink {
    /// Create (`window == None`) or extend a line plot.
    ///
    /// `rows[i]` holds one value per legend entry for `iters[i]`.
    fn update_lines(
        &mut self,
        env:    &str,
        window: Option<&str>,
        title:  &str,
        legend: &[String],
        iters:  &[usize],
        rows:   &[Vec<f64>],
    ) -> Result<String>;

    /// Publish a free-form text report.
    fn text(&mut self, env: &str, title: &str, body: &str) -> Result<()>;

    /// Remove everything previously published under `env`.
    fn delete_env(&mut self, env: &str) -> Result<()>;
}
