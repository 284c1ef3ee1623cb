//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use fmri_glm::prelude::*;
//! ```

pub use crate::contrast::{normalize, ContrastSpec, ContrastType, UnknownRegressors};
pub use crate::design::{DesignMatrix, DriftModel};
pub use crate::engine::{FittedModel, ModelingEngine, OlsEngine, OutputType, VolumetricMap};
pub use crate::entities::Entities;
pub use crate::first_level::{FirstLevelInputs, FirstLevelModel, SessionInfo};
pub use crate::matcher::{match_runs, StatMapRecord};
pub use crate::second_level::{GroupContrast, SecondLevelInputs, SecondLevelModel};
