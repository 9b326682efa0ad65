// ============================================================
// Layer 5 — Upstream Model Composition
// ============================================================
// Builds the frozen networks a strategy depends on:
//
//   dae      ← nothing
//   ori-vae  ← nothing
//   vae      ← frozen DAE         (perceptual metric)
//   scan     ← frozen VAE + DAE   (perceptual posterior, sym2img)
//
// Each upstream net is rebuilt from the run config and loaded from
// the `ckpt_name` snapshot of its own run directory. A run that was never
// trained leaves the freshly initialised weights in place, with a
// warning, so the chain can still be exercised end to end.

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;

use crate::application::train_use_case::TrainConfig;
use crate::domain::config::DatasetKind;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    frozen::Frozen,
    model::{BetaVaeNet, DaeNet},
};

fn load_upstream<B, M>(cfg: &TrainConfig, env_name: &str, net: M, device: &B::Device) -> Result<M>
where
    B: AutodiffBackend,
    M: burn::module::Module<B>,
{
    let dirs = cfg.run_dirs(env_name);
    let checkpoints = CheckpointManager::new(&dirs.ckpt_dir)?;
    let (net, iteration) = checkpoints.load_model::<B, M>(&cfg.ckpt_name, net, device)?;
    match iteration {
        Some(iter) => tracing::info!("=> frozen '{}' at iter {}", env_name, iter),
        None => tracing::warn!(
            "no checkpoint for '{}' at '{}', freezing untrained weights",
            env_name,
            checkpoints.path(&cfg.ckpt_name).display()
        ),
    }
    Ok(net)
}

/// The perceptual DAE, frozen.
pub fn frozen_dae<B: AutodiffBackend>(
    cfg:    &TrainConfig,
    kind:   DatasetKind,
    device: &B::Device,
) -> Result<Frozen<DaeNet<B>>> {
    let net = cfg.dae_net(kind).init::<B>(device);
    let net = load_upstream::<B, _>(cfg, &cfg.dae_env_name, net, device)?;
    Ok(Frozen::freeze::<B>(net))
}

/// The perceptual beta-VAE and the DAE it was trained against, both frozen.
pub fn frozen_vae<B: AutodiffBackend>(
    cfg:    &TrainConfig,
    kind:   DatasetKind,
    device: &B::Device,
) -> Result<(Frozen<BetaVaeNet<B>>, Frozen<DaeNet<B>>)> {
    let dae = frozen_dae::<B>(cfg, kind, device)?;
    let net = cfg.vae_net(kind)?.init::<B>(device);
    let net = load_upstream::<B, _>(cfg, &cfg.vae_env_name, net, device)?;
    Ok((Frozen::freeze::<B>(net), dae))
}
