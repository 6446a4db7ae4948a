//! Reverse lookup from a packed index to the model quantity stored there.

use crate::errors::IndexOutOfRange;
use crate::layout::{BlockOwner, MULSTD_PER_SMOOTHING, MulstdKind, PackedLayout};
use crate::mulcov::{CovariateId, EffectKind, MulcovTarget};
use crate::rate::RateKind;
use crate::smoothing::SmoothingId;
use std::fmt;

/// Which node a rate variable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateNode {
    Child(usize),
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableOwner {
    Mulstd {
        smoothing_id: SmoothingId,
        kind: MulstdKind,
    },
    Rate {
        rate: RateKind,
        node: RateNode,
    },
    Mulcov {
        effect_kind: EffectKind,
        target: MulcovTarget,
        covariate_id: CovariateId,
        k: usize,
    },
}

/// One row of the variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSlot {
    pub index: usize,
    pub owner: VariableOwner,
    pub smoothing_id: SmoothingId,
    /// `(age_index, time_index)` on the smoothing grid; `None` for mulstd variables.
    pub grid_point: Option<(usize, usize)>,
}

/// Optional display names for the id spaces a variable label refers to.
/// Missing entries fall back to the numeric id.
#[derive(Debug, Clone, Default)]
pub struct VariableNames {
    pub smoothings: Vec<String>,
    pub children: Vec<String>,
    pub integrands: Vec<String>,
    pub covariates: Vec<String>,
}

impl VariableNames {
    fn lookup(table: &[String], id: usize) -> String {
        table.get(id).cloned().unwrap_or_else(|| id.to_string())
    }
}

impl PackedLayout {
    /// Describes the variable at packed index `index`.
    pub fn variable(&self, index: usize) -> Result<VariableSlot, IndexOutOfRange> {
        let owned = self.block_at(index)?;
        let local = index - owned.block.offset;
        let (owner, grid_point) = match owned.owner {
            BlockOwner::Mulstd(smoothing_id) => {
                debug_assert!(local < MULSTD_PER_SMOOTHING);
                let kind = MulstdKind::ALL[local];
                (VariableOwner::Mulstd { smoothing_id, kind }, None)
            }
            BlockOwner::Rate { rate, child_index } => {
                let node = if child_index < self.child_count() {
                    RateNode::Child(child_index)
                } else {
                    RateNode::Parent
                };
                (VariableOwner::Rate { rate, node }, Some(owned.grid))
            }
            BlockOwner::Mulcov {
                effect_kind,
                target,
                k,
            } => {
                let covariate_id = self.mulcov_info(effect_kind, target, k)?.covariate_id;
                let owner = VariableOwner::Mulcov {
                    effect_kind,
                    target,
                    covariate_id,
                    k,
                };
                (owner, Some(owned.grid))
            }
        };
        Ok(VariableSlot {
            index,
            owner,
            smoothing_id: owned.smoothing_id,
            grid_point: grid_point
                .map(|grid| (local / grid.time_count, local % grid.time_count)),
        })
    }

    /// The full variable table in packed order.
    pub fn variables(&self) -> Result<Vec<VariableSlot>, IndexOutOfRange> {
        (0..self.size()).map(|index| self.variable(index)).collect()
    }

    /// Human-readable label, e.g. `iota(north; a1,t0)` or `mulstd_dage(s_iota)`.
    pub fn variable_name(
        &self,
        index: usize,
        names: &VariableNames,
    ) -> Result<String, IndexOutOfRange> {
        let slot = self.variable(index)?;
        Ok(slot.label(names))
    }
}

impl VariableSlot {
    pub fn label(&self, names: &VariableNames) -> String {
        let grid = match self.grid_point {
            Some((age_index, time_index)) => format!("; a{age_index},t{time_index}"),
            None => String::new(),
        };
        match self.owner {
            VariableOwner::Mulstd { smoothing_id, kind } => format!(
                "mulstd_{}({})",
                kind.name(),
                VariableNames::lookup(&names.smoothings, smoothing_id.index())
            ),
            VariableOwner::Rate { rate, node } => {
                let node = match node {
                    RateNode::Child(child) => VariableNames::lookup(&names.children, child),
                    RateNode::Parent => "parent".to_string(),
                };
                format!("{rate}({node}{grid})")
            }
            VariableOwner::Mulcov {
                effect_kind,
                target,
                covariate_id,
                ..
            } => {
                let target = match target {
                    MulcovTarget::Rate(rate) => rate.to_string(),
                    MulcovTarget::Integrand(id) => VariableNames::lookup(&names.integrands, id.0),
                };
                format!(
                    "{effect_kind}({} -> {target}{grid})",
                    VariableNames::lookup(&names.covariates, covariate_id.0)
                )
            }
        }
    }
}

impl fmt::Display for VariableSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label(&VariableNames::default()))
    }
}
