// ============================================================
// Layer 6 — Metric Sinks
// ============================================================
// Two MetricSink implementations:
//
//   CsvMetricSink — every line window is a CSV file, every text
//                   report a .txt file, grouped by env directory
//   DisabledSink  — visualization off; accepts and drops everything
//
// Output layout for CsvMetricSink:
//   <dir>/
//     beta_VAE_lines/
//       reconstruction_loss.csv   ← window handle "reconstruction_loss"
//       posterior_mean.csv
//     SCAN_img2sym/
//       iter_2000.txt
//
// Example CSV output:
//   iteration,z_0,z_1
//   1000,0.012000,-0.431000
//   2000,0.008000,-0.402000

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::MetricSink;

/// Writes line windows and text reports under one directory.
pub struct CsvMetricSink {
    dir: PathBuf,
}

impl CsvMetricSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn env_dir(&self, env: &str) -> Result<PathBuf> {
        let path = self.dir.join(env);
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// "posterior mean" → "posterior_mean"
fn window_name(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

impl MetricSink for CsvMetricSink {
    fn update_lines(
        &mut self,
        env:    &str,
        window: Option<&str>,
        title:  &str,
        legend: &[String],
        iters:  &[usize],
        rows:   &[Vec<f64>],
    ) -> Result<String> {
        let env_dir = self.env_dir(env)?;

        // An unknown or vanished handle starts a new window.
        let handle = match window {
            Some(h) if env_dir.join(format!("{h}.csv")).exists() => h.to_string(),
            _ => {
                let h = window_name(title);
                let mut f = fs::File::create(env_dir.join(format!("{h}.csv")))?;
                let header: Vec<&str> = legend
                    .iter()
                    .map(|l| if l.is_empty() { "value" } else { l.as_str() })
                    .collect();
                writeln!(f, "iteration,{}", header.join(","))?;
                tracing::debug!("Created line window '{}/{}'", env, h);
                h
            }
        };

        let path = env_dir.join(format!("{handle}.csv"));
        let mut f = OpenOptions::new()
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot append to '{}'", path.display()))?;

        for (iter, row) in iters.iter().zip(rows) {
            let values: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
            writeln!(f, "{},{}", iter, values.join(","))?;
        }

        Ok(handle)
    }

    fn text(&mut self, env: &str, title: &str, body: &str) -> Result<()> {
        let path = self.env_dir(env)?.join(format!("{}.txt", window_name(title)));
        fs::write(&path, body)
            .with_context(|| format!("Cannot write report '{}'", path.display()))?;
        Ok(())
    }

    fn delete_env(&mut self, env: &str) -> Result<()> {
        let path = self.dir.join(env);
        if path.exists() {
            fs::remove_dir_all(&path)
                .with_context(|| format!("Cannot delete env '{}'", path.display()))?;
            tracing::debug!("Deleted env '{}'", env);
        }
        Ok(())
    }
}

/// Sink used when visualization is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSink;

impl MetricSink for DisabledSink {
    fn update_lines(
        &mut self,
        _env:   &str,
        window: Option<&str>,
        _title: &str,
        _legend: &[String],
        _iters: &[usize],
        _rows:  &[Vec<f64>],
    ) -> Result<String> {
        Ok(window.unwrap_or_default().to_string())
    }

    fn text(&mut self, _env: &str, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    fn delete_env(&mut self, _env: &str) -> Result<()> {
        Ok(())
    }
}
