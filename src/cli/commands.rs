// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` and `inspect`, and all their flags.
//
// clap's derive macros generate help text, error messages for
// bad values, and the string → number conversions.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::{SolverKind, TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train one solver (resumes from its checkpoint if present)
    Train(TrainArgs),

    /// Print a checkpoint's iteration and visualization handles
    Inspect(InspectArgs),
}

/// Which model family to train.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SolverArg {
    Dae,
    OriVae,
    Vae,
    Scan,
}

impl From<SolverArg> for SolverKind {
    fn from(s: SolverArg) -> Self {
        match s {
            SolverArg::Dae    => SolverKind::Dae,
            SolverArg::OriVae => SolverKind::OriVae,
            SolverArg::Vae    => SolverKind::Vae,
            SolverArg::Scan   => SolverKind::Scan,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, value_enum, default_value = "vae")]
    pub solver: SolverArg,

    /// dsprites, 3dchairs or celeba
    #[arg(long, default_value = "celeba")]
    pub dataset: String,

    /// Root holding one directory per dataset
    #[arg(long, default_value = "data")]
    pub dset_dir: String,

    #[arg(long, default_value_t = 64)]
    pub image_size: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Seeds data shuffling and occlusion masks
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    #[arg(long, default_value_t = 1_000_000)]
    pub max_iter: usize,

    /// Report, flush and save every N iterations
    #[arg(long, default_value_t = 10_000)]
    pub checkpoint_every: usize,

    /// Record metrics every N iterations (visualization on)
    #[arg(long, default_value_t = 1_000)]
    pub gather_every: usize,

    /// Checkpoint to resume from (snapshot number or "last"); never overwritten
    #[arg(long, default_value = "last")]
    pub ckpt_name: String,

    #[arg(long, default_value = "runs")]
    pub root_dir: String,

    #[arg(long, default_value = "checkpoints")]
    pub ckpt_dir: String,

    #[arg(long, default_value = "outputs")]
    pub output_dir: String,

    /// Write metric windows and reports under the output dir
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub vis_on: bool,

    /// beta-VAE objective: H (beta·KL) or B (gamma·|KL − C|)
    #[arg(long, default_value = "H")]
    pub objective: String,

    /// beta-VAE architecture: H or B
    #[arg(long, default_value = "H")]
    pub model: String,

    #[arg(long, default_value_t = 4.0)]
    pub beta: f64,

    #[arg(long, default_value_t = 1000.0)]
    pub gamma: f64,

    /// Final KL capacity for objective B
    #[arg(long, default_value_t = 25.0)]
    pub c_max: f64,

    /// Iteration at which the capacity reaches c_max
    #[arg(long, default_value_t = 100_000)]
    pub c_stop_iter: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.9)]
    pub beta1: f64,

    #[arg(long, default_value_t = 0.999)]
    pub beta2: f64,

    #[arg(long, default_value_t = 1e-8)]
    pub epsilon: f64,

    /// Width of every hidden layer
    #[arg(long, default_value_t = 256)]
    pub hidden: usize,

    #[arg(long, default_value_t = 100)]
    pub dae_z_dim: usize,

    #[arg(long, default_value_t = 32)]
    pub vae_z_dim: usize,

    /// Must equal --vae-z-dim
    #[arg(long, default_value_t = 32)]
    pub scan_z_dim: usize,

    #[arg(long, default_value = "DAE")]
    pub dae_env_name: String,

    #[arg(long, default_value = "VAE")]
    pub vae_env_name: String,

    #[arg(long, default_value = "SCAN")]
    pub scan_env_name: String,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            solver:           a.solver.into(),
            dataset:          a.dataset,
            dset_dir:         a.dset_dir,
            image_size:       a.image_size,
            batch_size:       a.batch_size,
            seed:             a.seed,
            max_iter:         a.max_iter,
            checkpoint_every: a.checkpoint_every,
            gather_every:     a.gather_every,
            ckpt_name:        a.ckpt_name,
            root_dir:         a.root_dir,
            ckpt_dir:         a.ckpt_dir,
            output_dir:       a.output_dir,
            vis_on:           a.vis_on,
            objective:        a.objective,
            model:            a.model,
            beta:             a.beta,
            gamma:            a.gamma,
            c_max:            a.c_max,
            c_stop_iter:      a.c_stop_iter,
            lr:               a.lr,
            beta1:            a.beta1,
            beta2:            a.beta2,
            epsilon:          a.epsilon,
            hidden:           a.hidden,
            dae_z_dim:        a.dae_z_dim,
            vae_z_dim:        a.vae_z_dim,
            scan_z_dim:       a.scan_z_dim,
            dae_env_name:     a.dae_env_name,
            vae_env_name:     a.vae_env_name,
            scan_env_name:    a.scan_env_name,
        }
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Checkpoint directory of one run, e.g. runs/VAE/checkpoints
    #[arg(long)]
    pub ckpt_dir: String,

    #[arg(long, default_value = "last")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["scan-solver", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let default = TrainConfig::default();
        assert_eq!(
            serde_json::to_value(&cfg).unwrap(),
            serde_json::to_value(&default).unwrap()
        );
    }

    #[test]
    fn test_solver_names() {
        let cli = Cli::try_parse_from(["scan-solver", "train", "--solver", "ori-vae", "--vis-on", "false"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.solver, SolverKind::OriVae);
        assert!(!cfg.vis_on);
        assert!(Cli::try_parse_from(["scan-solver", "train", "--solver", "gan"]).is_err());
    }
}
