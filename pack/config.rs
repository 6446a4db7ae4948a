//! Loading the model structure from a human-readable TOML file.
//!
//! The file refers to smoothings, children, integrands and covariates by
//! name. Names are resolved to dense ids exactly once, here, and every
//! reference is validated before a layout can be built.

use crate::errors::{ConfigError, StructuralConfigError};
use crate::layout::PackedLayout;
use crate::mulcov::{
    CovariateId, CovariateMultiplier, EffectKind, IntegrandId, MulcovRegistry, MulcovTarget,
};
use crate::rate::{RateKind, RateSmoothing, RateStructure};
use crate::smoothing::{Smoothing, SmoothingCatalog, SmoothingId};
use crate::variable::VariableNames;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    pub name: String,
    pub age_count: usize,
    pub time_count: usize,
}

/// Smoothing names for one rate. An omitted role is not modeled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTableConfig {
    #[serde(default)]
    pub pini: RateConfig,
    #[serde(default)]
    pub iota: RateConfig,
    #[serde(default)]
    pub rho: RateConfig,
    #[serde(default)]
    pub chi: RateConfig,
    #[serde(default)]
    pub omega: RateConfig,
}

impl RateTableConfig {
    fn get(&self, rate: RateKind) -> &RateConfig {
        match rate {
            RateKind::Pini => &self.pini,
            RateKind::Iota => &self.iota,
            RateKind::Rho => &self.rho,
            RateKind::Chi => &self.chi,
            RateKind::Omega => &self.omega,
        }
    }
}

/// One covariate multiplier. `rate` is set for `rate_mean`, `integrand` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulcovConfig {
    pub covariate: String,
    pub effect: EffectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<RateKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrand: Option<String>,
    pub smoothing: String,
}

/// The on-disk form of the model structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStructureConfig {
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub integrands: Vec<String>,
    #[serde(default)]
    pub covariates: Vec<String>,
    #[serde(default, rename = "smoothing")]
    pub smoothings: Vec<SmoothingConfig>,
    #[serde(default)]
    pub rate: RateTableConfig,
    #[serde(default, rename = "mulcov")]
    pub mulcovs: Vec<MulcovConfig>,
}

impl ModelStructureConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Resolves every name to its id and builds the validated leaf structures.
    pub fn resolve(&self) -> Result<ModelStructure, StructuralConfigError> {
        let smoothing_ids =
            name_index("smoothing", self.smoothings.iter().map(|s| s.name.as_str()))?;
        let integrand_ids = name_index("integrand", self.integrands.iter().map(String::as_str))?;
        let covariate_ids = name_index("covariate", self.covariates.iter().map(String::as_str))?;
        name_index("child", self.children.iter().map(String::as_str))?;

        let catalog = SmoothingCatalog::new(
            self.smoothings
                .iter()
                .map(|s| Smoothing {
                    age_count: s.age_count,
                    time_count: s.time_count,
                })
                .collect(),
        )?;

        let resolve_smoothing = |name: &str| -> Result<SmoothingId, StructuralConfigError> {
            lookup(&smoothing_ids, "smoothing", name).map(SmoothingId)
        };

        let mut rate_smoothings = [RateSmoothing::default(); RateKind::COUNT];
        for rate in RateKind::ALL {
            let entry = self.rate.get(rate);
            rate_smoothings[rate.index()] = RateSmoothing {
                parent: entry.parent.as_deref().map(resolve_smoothing).transpose()?,
                child: entry.child.as_deref().map(resolve_smoothing).transpose()?,
            };
        }
        let rates = RateStructure::new(&catalog, rate_smoothings)?;

        let mut entries = Vec::with_capacity(self.mulcovs.len());
        for mulcov in &self.mulcovs {
            let target = match (&mulcov.rate, &mulcov.integrand) {
                (Some(rate), None) => MulcovTarget::Rate(*rate),
                (None, Some(integrand)) => MulcovTarget::Integrand(IntegrandId(lookup(
                    &integrand_ids,
                    "integrand",
                    integrand,
                )?)),
                _ => {
                    return Err(StructuralConfigError::AmbiguousTarget {
                        covariate: mulcov.covariate.clone(),
                    });
                }
            };
            entries.push(CovariateMultiplier {
                covariate_id: CovariateId(lookup(&covariate_ids, "covariate", &mulcov.covariate)?),
                effect_kind: mulcov.effect,
                target,
                smoothing_id: resolve_smoothing(&mulcov.smoothing)?,
            });
        }
        let mulcovs = MulcovRegistry::new(&catalog, entries)?;

        log::debug!(
            "Resolved model structure: {} smoothings, {} children, {} integrands, {} multipliers",
            catalog.len(),
            self.children.len(),
            self.integrands.len(),
            mulcovs.len()
        );

        Ok(ModelStructure {
            catalog,
            rates,
            mulcovs,
            child_count: self.children.len(),
            integrand_count: self.integrands.len(),
            names: VariableNames {
                smoothings: self.smoothings.iter().map(|s| s.name.clone()).collect(),
                children: self.children.clone(),
                integrands: self.integrands.clone(),
                covariates: self.covariates.clone(),
            },
        })
    }
}

/// A validated snapshot of the model structure, ready to be packed.
#[derive(Debug, Clone)]
pub struct ModelStructure {
    pub catalog: SmoothingCatalog,
    pub rates: RateStructure,
    pub mulcovs: MulcovRegistry,
    pub child_count: usize,
    pub integrand_count: usize,
    pub names: VariableNames,
}

impl ModelStructure {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(ModelStructureConfig::load(path)?.resolve()?)
    }

    pub fn layout(&self) -> Result<PackedLayout, StructuralConfigError> {
        PackedLayout::new(
            &self.catalog,
            &self.rates,
            &self.mulcovs,
            self.child_count,
            self.integrand_count,
        )
    }
}

fn name_index<'a>(
    table: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<AHashMap<String, usize>, StructuralConfigError> {
    let mut index = AHashMap::new();
    for (id, name) in names.enumerate() {
        if index.insert(name.to_string(), id).is_some() {
            return Err(StructuralConfigError::DuplicateName {
                table,
                name: name.to_string(),
            });
        }
    }
    Ok(index)
}

fn lookup(
    index: &AHashMap<String, usize>,
    table: &'static str,
    name: &str,
) -> Result<usize, StructuralConfigError> {
    index
        .get(name)
        .copied()
        .ok_or_else(|| StructuralConfigError::UnknownName {
            table,
            name: name.to_string(),
        })
}
