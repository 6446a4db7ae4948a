use crate::errors::{IndexOutOfRange, StructuralConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a smoothing in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SmoothingId(pub usize);

impl SmoothingId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SmoothingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An age-time grid of prior-governed points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Smoothing {
    pub age_count: usize,
    pub time_count: usize,
}

impl Smoothing {
    /// Number of packed variables a trajectory on this grid occupies, or
    /// `None` when the product does not fit in `usize`.
    #[inline]
    pub fn point_count(&self) -> Option<usize> {
        self.age_count.checked_mul(self.time_count)
    }
}

/// Immutable lookup from smoothing id to grid shape. Ids are dense,
/// `0..len()`, in the order the smoothings were supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmoothingCatalog {
    smoothings: Vec<Smoothing>,
}

impl SmoothingCatalog {
    pub fn new(smoothings: Vec<Smoothing>) -> Result<Self, StructuralConfigError> {
        for (idx, smoothing) in smoothings.iter().enumerate() {
            if smoothing.age_count == 0 || smoothing.time_count == 0 {
                return Err(StructuralConfigError::EmptyGrid {
                    id: SmoothingId(idx),
                    age_count: smoothing.age_count,
                    time_count: smoothing.time_count,
                });
            }
            if smoothing.point_count().is_none() {
                return Err(StructuralConfigError::SizeOverflow {
                    context: format!(
                        "the {} x {} grid of smoothing {idx}",
                        smoothing.age_count, smoothing.time_count
                    ),
                });
            }
        }
        Ok(Self { smoothings })
    }

    /// Returns `(age_count, time_count)` for the smoothing.
    pub fn shape(&self, id: SmoothingId) -> Result<(usize, usize), IndexOutOfRange> {
        let smoothing = self.smoothing(id)?;
        Ok((smoothing.age_count, smoothing.time_count))
    }

    pub fn smoothing(&self, id: SmoothingId) -> Result<&Smoothing, IndexOutOfRange> {
        self.smoothings
            .get(id.index())
            .ok_or(IndexOutOfRange::Smoothing {
                id: id.index(),
                count: self.smoothings.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.smoothings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.smoothings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SmoothingId, &Smoothing)> {
        self.smoothings
            .iter()
            .enumerate()
            .map(|(idx, smoothing)| (SmoothingId(idx), smoothing))
    }

    /// Checks that `id` exists, describing the referencing entry in the error.
    pub(crate) fn require(
        &self,
        id: SmoothingId,
        context: impl FnOnce() -> String,
    ) -> Result<&Smoothing, StructuralConfigError> {
        self.smoothing(id)
            .map_err(|_| StructuralConfigError::DanglingSmoothing {
                context: context(),
                id,
                count: self.len(),
            })
    }
}
