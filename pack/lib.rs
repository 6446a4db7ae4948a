#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod config;
pub mod effects;
pub mod errors;
pub mod layout;
pub mod mulcov;
pub mod rate;
pub mod smoothing;
pub mod variable;

pub use config::{ModelStructure, ModelStructureConfig};
pub use errors::{ConfigError, IndexOutOfRange, StructuralConfigError};
pub use layout::{
    BlockOwner, MulcovInfo, MulstdKind, OwnedBlock, PackedLayout, RateInfo, VariableBlock,
};
pub use mulcov::{
    CovariateId, CovariateMultiplier, EffectKind, IntegrandId, MulcovRegistry, MulcovTarget,
};
pub use rate::{RateKind, RateRole, RateSmoothing, RateStructure};
pub use smoothing::{Smoothing, SmoothingCatalog, SmoothingId};
pub use variable::{RateNode, VariableNames, VariableOwner, VariableSlot};
