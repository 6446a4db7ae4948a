use crate::errors::{IndexOutOfRange, StructuralConfigError};
use crate::mulcov::{
    CovariateId, CovariateMultiplier, EffectKind, IntegrandId, MulcovRegistry, MulcovTarget,
};
use crate::rate::{RateKind, RateRole, RateStructure};
use crate::smoothing::{Smoothing, SmoothingCatalog, SmoothingId};
use std::ops::Range;

/// Number of standard-deviation multipliers allocated per smoothing.
pub const MULSTD_PER_SMOOTHING: usize = 3;

/// A half-open range `[offset, offset + length)` of the packed vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableBlock {
    pub offset: usize,
    pub length: usize,
}

impl VariableBlock {
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }
}

/// The three standard-deviation multipliers of a smoothing, in packed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulstdKind {
    Value,
    Dage,
    Dtime,
}

impl MulstdKind {
    pub const ALL: [MulstdKind; MULSTD_PER_SMOOTHING] =
        [MulstdKind::Value, MulstdKind::Dage, MulstdKind::Dtime];

    #[inline]
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            MulstdKind::Value => "value",
            MulstdKind::Dage => "dage",
            MulstdKind::Dtime => "dtime",
        }
    }
}

/// Location of one (rate, child-index) trajectory.
///
/// `smoothing_id` is `None` when the rate is not modeled for that role; the
/// block then has zero length at a valid offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateInfo {
    pub smoothing_id: Option<SmoothingId>,
    pub length: usize,
    pub offset: usize,
}

impl RateInfo {
    pub fn block(&self) -> VariableBlock {
        VariableBlock {
            offset: self.offset,
            length: self.length,
        }
    }
}

/// Location of one covariate multiplier trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulcovInfo {
    pub covariate_id: CovariateId,
    pub smoothing_id: SmoothingId,
    pub length: usize,
    pub offset: usize,
}

impl MulcovInfo {
    pub fn block(&self) -> VariableBlock {
        VariableBlock {
            offset: self.offset,
            length: self.length,
        }
    }
}

/// The structural entity a non-empty block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOwner {
    Mulstd(SmoothingId),
    /// `child_index == child_count` is the parent trajectory.
    Rate { rate: RateKind, child_index: usize },
    /// `k` is the position within the `(effect_kind, target)` group.
    Mulcov {
        effect_kind: EffectKind,
        target: MulcovTarget,
        k: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedBlock {
    pub owner: BlockOwner,
    pub smoothing_id: SmoothingId,
    /// Grid of the governing smoothing; rate and multiplier blocks are
    /// stored age-major, `offset + age_index * time_count + time_index`.
    pub grid: Smoothing,
    pub block: VariableBlock,
}

/// Offset table assigning every scalar unknown of the model a position in one
/// flat vector. Built once from a consistent snapshot of the model structure
/// and frozen afterwards; a structural change requires building a new layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedLayout {
    smoothing_count: usize,
    child_count: usize,
    integrand_count: usize,
    mulstd_offset: usize,
    /// `rate_info[rate][child_index]`, `child_count + 1` entries per rate.
    rate_info: Vec<Vec<RateInfo>>,
    /// Measurement multipliers indexed by integrand id.
    meas_mean_info: Vec<Vec<MulcovInfo>>,
    meas_std_info: Vec<Vec<MulcovInfo>>,
    /// Rate-mean multipliers indexed by rate.
    rate_mean_info: Vec<Vec<MulcovInfo>>,
    /// Every non-empty block, sorted by offset.
    blocks: Vec<OwnedBlock>,
    size: usize,
}

impl PackedLayout {
    /// Runs the packing algorithm. The iteration order below is part of the
    /// contract with the optimizer and must not be rearranged.
    pub fn new(
        catalog: &SmoothingCatalog,
        rates: &RateStructure,
        mulcovs: &MulcovRegistry,
        child_count: usize,
        integrand_count: usize,
    ) -> Result<Self, StructuralConfigError> {
        let mut allocator = BlockAllocator::default();

        // 1. Standard-deviation multipliers, three per smoothing.
        let mulstd_offset = allocator.current_offset;
        for (smoothing_id, smoothing) in catalog.iter() {
            allocator.push(
                BlockOwner::Mulstd(smoothing_id),
                smoothing_id,
                *smoothing,
                MULSTD_PER_SMOOTHING,
            )?;
        }

        // 2. Rates: the children first, then the parent at index child_count.
        let mut rate_info = Vec::with_capacity(RateKind::COUNT);
        for rate in RateKind::ALL {
            let assignment = rates.get(rate);
            let mut per_child = Vec::with_capacity(child_count + 1);
            for child_index in 0..=child_count {
                let role = if child_index < child_count {
                    RateRole::Child
                } else {
                    RateRole::Parent
                };
                let Some(smoothing_id) = assignment.for_role(role) else {
                    per_child.push(RateInfo {
                        smoothing_id: None,
                        length: 0,
                        offset: allocator.current_offset,
                    });
                    continue;
                };
                let smoothing =
                    catalog.require(smoothing_id, || format!("the {role} smoothing of {rate}"))?;
                if rate == RateKind::Pini && smoothing.age_count != 1 {
                    return Err(StructuralConfigError::PiniAgeGrid {
                        role,
                        id: smoothing_id,
                        age_count: smoothing.age_count,
                    });
                }
                let (offset, length) = allocator.push_grid(
                    BlockOwner::Rate { rate, child_index },
                    smoothing_id,
                    *smoothing,
                )?;
                per_child.push(RateInfo {
                    smoothing_id: Some(smoothing_id),
                    length,
                    offset,
                });
            }
            rate_info.push(per_child);
        }
        log::debug!(
            "Rate blocks end at offset {} ({} children per rate)",
            allocator.current_offset,
            child_count
        );

        // 3a. Measurement multipliers, grouped by integrand.
        for entry in mulcovs.entries() {
            if let MulcovTarget::Integrand(IntegrandId(integrand_id)) = entry.target {
                if integrand_id >= integrand_count {
                    return Err(StructuralConfigError::IntegrandOutOfRange {
                        integrand_id,
                        integrand_count,
                    });
                }
            }
        }
        let mut meas_mean_info = vec![Vec::new(); integrand_count];
        let mut meas_std_info = vec![Vec::new(); integrand_count];
        for integrand_id in 0..integrand_count {
            let target = MulcovTarget::Integrand(IntegrandId(integrand_id));
            for (mulcov_id, entry) in mulcovs.entries().iter().enumerate() {
                if entry.target != target {
                    continue;
                }
                let group = match entry.effect_kind {
                    EffectKind::MeasMean => &mut meas_mean_info[integrand_id],
                    EffectKind::MeasStd => &mut meas_std_info[integrand_id],
                    EffectKind::RateMean => continue,
                };
                allocator.push_mulcov(catalog, mulcov_id, entry, group)?;
            }
        }

        // 3b. Rate-mean multipliers, grouped by rate.
        let mut rate_mean_info = vec![Vec::new(); RateKind::COUNT];
        for rate in RateKind::ALL {
            let target = MulcovTarget::Rate(rate);
            for (mulcov_id, entry) in mulcovs.entries().iter().enumerate() {
                if entry.effect_kind != EffectKind::RateMean || entry.target != target {
                    continue;
                }
                let group = &mut rate_mean_info[rate.index()];
                allocator.push_mulcov(catalog, mulcov_id, entry, group)?;
            }
        }

        let BlockAllocator {
            blocks,
            current_offset,
        } = allocator;
        log::info!(
            "Packed layout: {} variables ({} smoothings, {} children, {} covariate multipliers)",
            current_offset,
            catalog.len(),
            child_count,
            mulcovs.len()
        );

        Ok(PackedLayout {
            smoothing_count: catalog.len(),
            child_count,
            integrand_count,
            mulstd_offset,
            rate_info,
            meas_mean_info,
            meas_std_info,
            rate_mean_info,
            blocks,
            size: current_offset,
        })
    }

    /// Length of the packed variable vector.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn smoothing_count(&self) -> usize {
        self.smoothing_count
    }

    pub fn child_count(&self) -> usize {
        self.child_count
    }

    pub fn integrand_count(&self) -> usize {
        self.integrand_count
    }

    /// Offset of the value multiplier for `smoothing_id`; the dage and dtime
    /// multipliers follow it directly.
    pub fn mulstd_offset(&self, smoothing_id: SmoothingId) -> Result<usize, IndexOutOfRange> {
        if smoothing_id.index() >= self.smoothing_count {
            return Err(IndexOutOfRange::Smoothing {
                id: smoothing_id.index(),
                count: self.smoothing_count,
            });
        }
        Ok(self.mulstd_offset + MULSTD_PER_SMOOTHING * smoothing_id.index())
    }

    pub fn mulstd_index(
        &self,
        smoothing_id: SmoothingId,
        kind: MulstdKind,
    ) -> Result<usize, IndexOutOfRange> {
        Ok(self.mulstd_offset(smoothing_id)? + kind.position())
    }

    /// `child_index < child_count` selects a random effect, `child_index == child_count`
    /// the parent trajectory.
    pub fn rate_info(
        &self,
        rate: RateKind,
        child_index: usize,
    ) -> Result<RateInfo, IndexOutOfRange> {
        self.rate_info[rate.index()]
            .get(child_index)
            .copied()
            .ok_or(IndexOutOfRange::ChildIndex {
                rate,
                index: child_index,
                child_count: self.child_count,
            })
    }

    /// Number of multipliers registered for `(effect_kind, target)`.
    pub fn mulcov_count(
        &self,
        effect_kind: EffectKind,
        target: MulcovTarget,
    ) -> Result<usize, IndexOutOfRange> {
        Ok(self.mulcov_group(effect_kind, target)?.len())
    }

    /// The `k`-th multiplier, in declaration order, for `(effect_kind, target)`.
    pub fn mulcov_info(
        &self,
        effect_kind: EffectKind,
        target: MulcovTarget,
        k: usize,
    ) -> Result<MulcovInfo, IndexOutOfRange> {
        let group = self.mulcov_group(effect_kind, target)?;
        group.get(k).copied().ok_or(IndexOutOfRange::Mulcov {
            effect_kind,
            target,
            k,
            count: group.len(),
        })
    }

    /// All non-empty blocks in packed order. Together they partition `[0, size())`.
    pub fn blocks(&self) -> &[OwnedBlock] {
        &self.blocks
    }

    /// The block containing packed index `index`.
    pub fn block_at(&self, index: usize) -> Result<&OwnedBlock, IndexOutOfRange> {
        if index >= self.size {
            return Err(IndexOutOfRange::PackedIndex {
                index,
                size: self.size,
            });
        }
        let position = self
            .blocks
            .partition_point(|owned| owned.block.offset + owned.block.length <= index);
        self.blocks.get(position).ok_or(IndexOutOfRange::PackedIndex {
            index,
            size: self.size,
        })
    }

    fn mulcov_group(
        &self,
        effect_kind: EffectKind,
        target: MulcovTarget,
    ) -> Result<&[MulcovInfo], IndexOutOfRange> {
        let by_integrand = match (effect_kind, target) {
            (EffectKind::RateMean, MulcovTarget::Rate(rate)) => {
                return Ok(&self.rate_mean_info[rate.index()]);
            }
            (EffectKind::MeasMean, MulcovTarget::Integrand(id)) => (&self.meas_mean_info, id),
            (EffectKind::MeasStd, MulcovTarget::Integrand(id)) => (&self.meas_std_info, id),
            _ => return Ok(&[]),
        };
        let (groups, IntegrandId(integrand_id)) = by_integrand;
        groups
            .get(integrand_id)
            .map(Vec::as_slice)
            .ok_or(IndexOutOfRange::Integrand {
                id: integrand_id,
                count: self.integrand_count,
            })
    }
}

/// Running offset plus the blocks handed out so far.
#[derive(Default)]
struct BlockAllocator {
    blocks: Vec<OwnedBlock>,
    current_offset: usize,
}

impl BlockAllocator {
    /// Appends a non-empty block and returns its offset.
    fn push(
        &mut self,
        owner: BlockOwner,
        smoothing_id: SmoothingId,
        grid: Smoothing,
        length: usize,
    ) -> Result<usize, StructuralConfigError> {
        let offset = self.current_offset;
        let end = offset
            .checked_add(length)
            .ok_or_else(|| StructuralConfigError::SizeOverflow {
                context: describe(owner),
            })?;
        self.blocks.push(OwnedBlock {
            owner,
            smoothing_id,
            grid,
            block: VariableBlock { offset, length },
        });
        self.current_offset = end;
        Ok(offset)
    }

    /// Appends one trajectory on `grid`, returning `(offset, length)`.
    fn push_grid(
        &mut self,
        owner: BlockOwner,
        smoothing_id: SmoothingId,
        grid: Smoothing,
    ) -> Result<(usize, usize), StructuralConfigError> {
        let length = grid
            .point_count()
            .ok_or_else(|| StructuralConfigError::SizeOverflow {
                context: describe(owner),
            })?;
        let offset = self.push(owner, smoothing_id, grid, length)?;
        Ok((offset, length))
    }

    fn push_mulcov(
        &mut self,
        catalog: &SmoothingCatalog,
        mulcov_id: usize,
        entry: &CovariateMultiplier,
        group: &mut Vec<MulcovInfo>,
    ) -> Result<(), StructuralConfigError> {
        // Groups are per (effect_kind, target), so a repeated covariate is a duplicate pair.
        if group
            .iter()
            .any(|info| info.covariate_id == entry.covariate_id)
        {
            return Err(StructuralConfigError::DuplicateMulcov {
                effect_kind: entry.effect_kind,
                covariate_id: entry.covariate_id,
                target: entry.target,
            });
        }
        let smoothing = catalog.require(entry.smoothing_id, || {
            format!("covariate multiplier {mulcov_id}")
        })?;
        let (offset, length) = self.push_grid(
            BlockOwner::Mulcov {
                effect_kind: entry.effect_kind,
                target: entry.target,
                k: group.len(),
            },
            entry.smoothing_id,
            *smoothing,
        )?;
        group.push(MulcovInfo {
            covariate_id: entry.covariate_id,
            smoothing_id: entry.smoothing_id,
            length,
            offset,
        });
        Ok(())
    }
}

fn describe(owner: BlockOwner) -> String {
    match owner {
        BlockOwner::Mulstd(smoothing_id) => {
            format!("the standard-deviation multipliers of smoothing {smoothing_id}")
        }
        BlockOwner::Rate { rate, child_index } => format!("{rate} block {child_index}"),
        BlockOwner::Mulcov {
            effect_kind,
            target,
            k,
        } => format!("{effect_kind} multiplier {k} for {target}"),
    }
}
