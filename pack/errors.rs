use crate::mulcov::{CovariateId, EffectKind, MulcovTarget};
use crate::rate::{RateKind, RateRole};
use crate::smoothing::SmoothingId;
use thiserror::Error;

/// The model structure violates an invariant of the packing layout.
///
/// These are always fatal to building a layout and must reach the caller
/// before any fitting work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralConfigError {
    #[error("smoothing {id} has an empty grid ({age_count} ages x {time_count} times)")]
    EmptyGrid {
        id: SmoothingId,
        age_count: usize,
        time_count: usize,
    },
    #[error("packed vector size overflows usize at {context}")]
    SizeOverflow { context: String },
    #[error("{context} references smoothing {id}, but the catalog only has {count} smoothings")]
    DanglingSmoothing {
        context: String,
        id: SmoothingId,
        count: usize,
    },
    #[error(
        "the {role} smoothing {id} for pini has {age_count} age points; initial prevalence requires exactly one"
    )]
    PiniAgeGrid {
        role: RateRole,
        id: SmoothingId,
        age_count: usize,
    },
    #[error("covariate {covariate_id} appears twice as a {effect_kind} multiplier for {target}")]
    DuplicateMulcov {
        effect_kind: EffectKind,
        covariate_id: CovariateId,
        target: MulcovTarget,
    },
    #[error("a {effect_kind} multiplier cannot target {target}")]
    TargetKindMismatch {
        effect_kind: EffectKind,
        target: MulcovTarget,
    },
    #[error(
        "multiplier targets integrand {integrand_id}, but the model only has {integrand_count} integrands"
    )]
    IntegrandOutOfRange {
        integrand_id: usize,
        integrand_count: usize,
    },
    #[error("unknown {table} name '{name}'")]
    UnknownName { table: &'static str, name: String },
    #[error("{table} name '{name}' is defined more than once")]
    DuplicateName { table: &'static str, name: String },
    #[error(
        "multiplier for covariate '{covariate}' must name exactly one of `rate` or `integrand`"
    )]
    AmbiguousTarget { covariate: String },
}

/// An accessor was called with an identifier outside the range of an
/// already-built layout. This is a caller bug, not a data problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexOutOfRange {
    #[error("smoothing id {id} is out of range (count {count})")]
    Smoothing { id: usize, count: usize },
    #[error("child index {index} for {rate} exceeds the parent index {child_count}")]
    ChildIndex {
        rate: RateKind,
        index: usize,
        child_count: usize,
    },
    #[error("integrand id {id} is out of range (count {count})")]
    Integrand { id: usize, count: usize },
    #[error("{effect_kind} multiplier {k} for {target} is out of range (count {count})")]
    Mulcov {
        effect_kind: EffectKind,
        target: MulcovTarget,
        k: usize,
        count: usize,
    },
    #[error("packed index {index} is out of range (size {size})")]
    PackedIndex { index: usize, size: usize },
    #[error("{what} vector has length {found}, expected {expected}")]
    VectorLength {
        what: &'static str,
        found: usize,
        expected: usize,
    },
}

/// Failure to load a model structure from disk.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read model structure file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model structure: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model structure to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid model structure: {0}")]
    Structural(#[from] StructuralConfigError),
}
