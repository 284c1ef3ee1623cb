//! Statistical modeling engine contract.
//!
//! The drivers never estimate anything themselves. They hand a design
//! request to a [`ModelingEngine`], fit the returned design, and ask the
//! resulting [`FittedModel`] for contrast maps. Each driver owns its engine,
//! so no fit state is shared between invocations.
//!
//! [`OlsEngine`] is the bundled implementation.

mod ols;
mod volume;

pub use ols::{OlsEngine, OlsFit, DEFAULT_HIGH_PASS};
pub use volume::VolumetricMap;

use crate::contrast::ContrastType;
use crate::design::{DesignMatrix, DesignRequest};
use crate::error::Result;

/// Quantity a contrast map holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    /// Linear combination of parameter estimates.
    EffectSize,
    /// Test statistic of the contrast's type.
    Stat,
}

/// Builds designs and fits them to data.
pub trait ModelingEngine {
    /// Fitted model produced by [`ModelingEngine::fit`].
    type Fitted: FittedModel;

    /// Builds a first-level design from frame times, events, confounds and a
    /// drift policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is inconsistent (for example confounds
    /// whose length differs from the frame count).
    fn build_design_matrix(&self, request: &DesignRequest) -> Result<DesignMatrix>;

    /// Fits `design` to every voxel of `data` (one design row per volume).
    /// Without a mask every voxel is fitted.
    ///
    /// # Errors
    ///
    /// Returns an error on shape mismatch or a design that cannot be estimated.
    fn fit(
        &self,
        data: &VolumetricMap,
        mask: Option<&VolumetricMap>,
        design: &DesignMatrix,
    ) -> Result<Self::Fitted>;
}

/// A fitted model that evaluates contrasts.
pub trait FittedModel {
    /// Evaluates dense contrast rows against the fitted parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a row's length differs from the design width or the
    /// contrast cannot be evaluated as `contrast_type`.
    fn compute_contrast(
        &self,
        weights: &[Vec<f64>],
        contrast_type: ContrastType,
        output: OutputType,
    ) -> Result<VolumetricMap>;
}
