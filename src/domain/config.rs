// ============================================================
// Layer 3 — Configuration Vocabulary
// ============================================================
// Plain enums for every string-valued option the solvers accept.
// Parsing happens once, when a solver is built, and an unknown
// value is always a SolverError. Nothing falls back to a default.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::error::SolverError;

// ─── Decoder distribution ────────────────────────────────────────────────────
/// Likelihood used by the reconstruction loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecoderDistribution {
    /// Binary cross-entropy; predictions must lie strictly inside (0, 1)
    Bernoulli,
    /// Sum of squared errors
    Gaussian,
}

impl FromStr for DecoderDistribution {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bernoulli" => Ok(Self::Bernoulli),
            "gaussian"  => Ok(Self::Gaussian),
            other       => Err(SolverError::UnknownDistribution(other.to_string())),
        }
    }
}

impl fmt::Display for DecoderDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bernoulli => write!(f, "bernoulli"),
            Self::Gaussian  => write!(f, "gaussian"),
        }
    }
}

// ─── Dataset identity ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Dsprites,
    Chairs3d,
    CelebA,
}

impl DatasetKind {
    /// Image channel count for this dataset.
    pub fn channels(self) -> usize {
        match self {
            Self::Dsprites => 1,
            Self::Chairs3d | Self::CelebA => 3,
        }
    }

    /// Pixel likelihood used when training on this dataset.
    pub fn distribution(self) -> DecoderDistribution {
        match self {
            Self::Dsprites => DecoderDistribution::Bernoulli,
            Self::Chairs3d | Self::CelebA => DecoderDistribution::Gaussian,
        }
    }

    /// Directory name under the dataset root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Dsprites => "dsprites",
            Self::Chairs3d => "3dchairs",
            Self::CelebA   => "celeba",
        }
    }
}

impl FromStr for DatasetKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dsprites" => Ok(Self::Dsprites),
            "3dchairs" => Ok(Self::Chairs3d),
            "celeba"   => Ok(Self::CelebA),
            _          => Err(SolverError::UnknownDataset(s.to_string())),
        }
    }
}

// ─── VAE architecture variant ────────────────────────────────────────────────
/// H = Higgins et al. (one hidden layer), B = Burgess et al. (two).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    H,
    B,
}

impl FromStr for ModelVariant {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H" | "h" => Ok(Self::H),
            "B" | "b" => Ok(Self::B),
            _         => Err(SolverError::UnknownModel(s.to_string())),
        }
    }
}

// ─── VAE objective ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveKind {
    /// recon + beta * KL
    H,
    /// recon + gamma * |KL - C(iteration)|
    B,
}

impl FromStr for ObjectiveKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H" | "h" => Ok(Self::H),
            "B" | "b" => Ok(Self::B),
            _         => Err(SolverError::UnknownObjective(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_resolution() {
        let d: DatasetKind = "dSprites".parse().unwrap();
        assert_eq!(d.channels(), 1);
        assert_eq!(d.distribution(), DecoderDistribution::Bernoulli);

        let c: DatasetKind = "celeba".parse().unwrap();
        assert_eq!(c.channels(), 3);
        assert_eq!(c.distribution(), DecoderDistribution::Gaussian);
    }

    #[test]
    fn test_unknown_values_fail() {
        assert!(matches!("mnist".parse::<DatasetKind>(), Err(SolverError::UnknownDataset(_))));
        assert!(matches!("C".parse::<ModelVariant>(), Err(SolverError::UnknownModel(_))));
        assert!(matches!("X".parse::<ObjectiveKind>(), Err(SolverError::UnknownObjective(_))));
        assert!(matches!(
            "poisson".parse::<DecoderDistribution>(),
            Err(SolverError::UnknownDistribution(_))
        ));
    }
}
