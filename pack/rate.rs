use crate::errors::StructuralConfigError;
use crate::smoothing::{SmoothingCatalog, SmoothingId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five hazard-type rates of the disease model, in canonical packing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    /// Initial prevalence. Has no age dependence.
    Pini,
    /// Incidence.
    Iota,
    /// Remission.
    Rho,
    /// Excess mortality.
    Chi,
    /// Other-cause mortality.
    Omega,
}

impl RateKind {
    pub const COUNT: usize = 5;
    pub const ALL: [RateKind; RateKind::COUNT] = [
        RateKind::Pini,
        RateKind::Iota,
        RateKind::Rho,
        RateKind::Chi,
        RateKind::Omega,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RateKind::Pini => "pini",
            RateKind::Iota => "iota",
            RateKind::Rho => "rho",
            RateKind::Chi => "chi",
            RateKind::Omega => "omega",
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a smoothing governs the parent trajectory or the children's random effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateRole {
    Parent,
    Child,
}

impl fmt::Display for RateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateRole::Parent => f.write_str("parent"),
            RateRole::Child => f.write_str("child"),
        }
    }
}

/// Smoothing assignment for one rate. `None` means the rate is not modeled in that role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSmoothing {
    pub parent: Option<SmoothingId>,
    pub child: Option<SmoothingId>,
}

impl RateSmoothing {
    pub fn for_role(&self, role: RateRole) -> Option<SmoothingId> {
        match role {
            RateRole::Parent => self.parent,
            RateRole::Child => self.child,
        }
    }
}

/// Parent and child smoothing per rate, indexed by `RateKind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateStructure {
    rates: [RateSmoothing; RateKind::COUNT],
}

impl RateStructure {
    /// Validates every referenced smoothing against `catalog`.
    pub fn new(
        catalog: &SmoothingCatalog,
        rates: [RateSmoothing; RateKind::COUNT],
    ) -> Result<Self, StructuralConfigError> {
        for rate in RateKind::ALL {
            for role in [RateRole::Parent, RateRole::Child] {
                if let Some(id) = rates[rate.index()].for_role(role) {
                    catalog.require(id, || format!("the {role} smoothing of {rate}"))?;
                }
            }
        }
        Ok(Self { rates })
    }

    /// No rate is modeled.
    pub fn empty() -> Self {
        Self {
            rates: [RateSmoothing::default(); RateKind::COUNT],
        }
    }

    pub fn get(&self, rate: RateKind) -> &RateSmoothing {
        &self.rates[rate.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoothing::Smoothing;

    #[test]
    fn canonical_order_matches_discriminants() {
        for (idx, rate) in RateKind::ALL.iter().enumerate() {
            assert_eq!(rate.index(), idx);
        }
        assert!(RateKind::Pini < RateKind::Omega);
    }

    #[test]
    fn dangling_child_smoothing_is_rejected() {
        let catalog = SmoothingCatalog::new(vec![Smoothing {
            age_count: 2,
            time_count: 2,
        }])
        .unwrap();
        let mut rates = [RateSmoothing::default(); RateKind::COUNT];
        rates[RateKind::Chi.index()].child = Some(SmoothingId(3));

        let err = RateStructure::new(&catalog, rates).unwrap_err();
        match err {
            StructuralConfigError::DanglingSmoothing { context, id, count } => {
                assert_eq!(context, "the child smoothing of chi");
                assert_eq!(id, SmoothingId(3));
                assert_eq!(count, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
