use crate::errors::StructuralConfigError;
use crate::rate::RateKind;
use crate::smoothing::{SmoothingCatalog, SmoothingId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a covariate in the covariate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CovariateId(pub usize);

impl fmt::Display for CovariateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of an integrand (measured output quantity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntegrandId(pub usize);

impl fmt::Display for IntegrandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a covariate multiplier scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// The mean of a rate trajectory.
    RateMean,
    /// The mean of a measurement.
    MeasMean,
    /// The standard deviation of a measurement.
    MeasStd,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] =
        [EffectKind::RateMean, EffectKind::MeasMean, EffectKind::MeasStd];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::RateMean => "rate_mean",
            EffectKind::MeasMean => "meas_mean",
            EffectKind::MeasStd => "meas_std",
        }
    }

    /// `rate_mean` targets rates, the measurement kinds target integrands.
    pub fn accepts(self, target: MulcovTarget) -> bool {
        matches!(
            (self, target),
            (EffectKind::RateMean, MulcovTarget::Rate(_))
                | (EffectKind::MeasMean, MulcovTarget::Integrand(_))
                | (EffectKind::MeasStd, MulcovTarget::Integrand(_))
        )
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MulcovTarget {
    Rate(RateKind),
    Integrand(IntegrandId),
}

impl fmt::Display for MulcovTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MulcovTarget::Rate(rate) => write!(f, "rate {rate}"),
            MulcovTarget::Integrand(id) => write!(f, "integrand {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CovariateMultiplier {
    pub covariate_id: CovariateId,
    pub effect_kind: EffectKind,
    pub target: MulcovTarget,
    pub smoothing_id: SmoothingId,
}

/// Covariate multipliers in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MulcovRegistry {
    entries: Vec<CovariateMultiplier>,
}

impl MulcovRegistry {
    /// Checks that every target matches its effect kind and every smoothing exists.
    /// Duplicate `(covariate, target)` pairs are detected when the layout is built.
    pub fn new(
        catalog: &SmoothingCatalog,
        entries: Vec<CovariateMultiplier>,
    ) -> Result<Self, StructuralConfigError> {
        for (mulcov_id, entry) in entries.iter().enumerate() {
            if !entry.effect_kind.accepts(entry.target) {
                return Err(StructuralConfigError::TargetKindMismatch {
                    effect_kind: entry.effect_kind,
                    target: entry.target,
                });
            }
            catalog.require(entry.smoothing_id, || {
                format!("covariate multiplier {mulcov_id}")
            })?;
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CovariateMultiplier] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
