//! Split of the packed vector into fixed and random effects.
//!
//! The random effects are exactly the child rate blocks; every other packed
//! variable is a fixed effect. Both compact vectors keep packed order, so the
//! random vector is rate-major, then child-major, then age/time grid order.

use crate::errors::IndexOutOfRange;
use crate::layout::{BlockOwner, PackedLayout, VariableBlock};
use ndarray::{ArrayView1, ArrayViewMut1, s};

impl PackedLayout {
    fn is_random_effect(&self, owner: &BlockOwner) -> bool {
        matches!(owner, BlockOwner::Rate { child_index, .. } if *child_index < self.child_count())
    }

    /// Blocks holding random effects, in packed order.
    pub fn random_effect_blocks(&self) -> impl Iterator<Item = VariableBlock> + '_ {
        self.blocks()
            .iter()
            .filter(|owned| self.is_random_effect(&owned.owner))
            .map(|owned| owned.block)
    }

    /// Blocks holding fixed effects, in packed order.
    pub fn fixed_effect_blocks(&self) -> impl Iterator<Item = VariableBlock> + '_ {
        self.blocks()
            .iter()
            .filter(|owned| !self.is_random_effect(&owned.owner))
            .map(|owned| owned.block)
    }

    pub fn random_effect_size(&self) -> usize {
        self.random_effect_blocks().map(|block| block.length).sum()
    }

    pub fn fixed_effect_size(&self) -> usize {
        self.size() - self.random_effect_size()
    }

    /// Copies the random effects out of `pack_vec` into `random_vec`.
    pub fn get_random_effect<T: Clone>(
        &self,
        pack_vec: ArrayView1<T>,
        random_vec: ArrayViewMut1<T>,
    ) -> Result<(), IndexOutOfRange> {
        self.check_length("packed", pack_vec.len(), self.size())?;
        self.check_length("random effect", random_vec.len(), self.random_effect_size())?;
        gather(self.random_effect_blocks(), pack_vec, random_vec);
        Ok(())
    }

    /// Writes `random_vec` into the random-effect positions of `pack_vec`.
    pub fn put_random_effect<T: Clone>(
        &self,
        pack_vec: ArrayViewMut1<T>,
        random_vec: ArrayView1<T>,
    ) -> Result<(), IndexOutOfRange> {
        self.check_length("packed", pack_vec.len(), self.size())?;
        self.check_length("random effect", random_vec.len(), self.random_effect_size())?;
        scatter(self.random_effect_blocks(), pack_vec, random_vec);
        Ok(())
    }

    pub fn get_fixed_effect<T: Clone>(
        &self,
        pack_vec: ArrayView1<T>,
        fixed_vec: ArrayViewMut1<T>,
    ) -> Result<(), IndexOutOfRange> {
        self.check_length("packed", pack_vec.len(), self.size())?;
        self.check_length("fixed effect", fixed_vec.len(), self.fixed_effect_size())?;
        gather(self.fixed_effect_blocks(), pack_vec, fixed_vec);
        Ok(())
    }

    pub fn put_fixed_effect<T: Clone>(
        &self,
        pack_vec: ArrayViewMut1<T>,
        fixed_vec: ArrayView1<T>,
    ) -> Result<(), IndexOutOfRange> {
        self.check_length("packed", pack_vec.len(), self.size())?;
        self.check_length("fixed effect", fixed_vec.len(), self.fixed_effect_size())?;
        scatter(self.fixed_effect_blocks(), pack_vec, fixed_vec);
        Ok(())
    }

    fn check_length(
        &self,
        what: &'static str,
        found: usize,
        expected: usize,
    ) -> Result<(), IndexOutOfRange> {
        if found != expected {
            return Err(IndexOutOfRange::VectorLength {
                what,
                found,
                expected,
            });
        }
        Ok(())
    }
}

fn gather<T: Clone>(
    blocks: impl Iterator<Item = VariableBlock>,
    pack_vec: ArrayView1<T>,
    mut compact: ArrayViewMut1<T>,
) {
    let mut cursor = 0;
    for block in blocks {
        compact
            .slice_mut(s![cursor..cursor + block.length])
            .assign(&pack_vec.slice(s![block.range()]));
        cursor += block.length;
    }
}

fn scatter<T: Clone>(
    blocks: impl Iterator<Item = VariableBlock>,
    mut pack_vec: ArrayViewMut1<T>,
    compact: ArrayView1<T>,
) {
    let mut cursor = 0;
    for block in blocks {
        pack_vec
            .slice_mut(s![block.range()])
            .assign(&compact.slice(s![cursor..cursor + block.length]));
        cursor += block.length;
    }
}
