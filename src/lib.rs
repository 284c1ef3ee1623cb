//! fmri-glm: two-level general linear model pipeline for fMRI contrasts.
//!
//! A first-level model fits one run: event and confound regressors become a
//! design matrix, the design is fitted to every voxel, and user contrasts
//! (authored sparsely, by regressor name) are aligned to the design columns
//! and written as effect-size maps. A second-level model locates first-level
//! maps by metadata and fits one intercept model per group contrast.
//!
//! # Quick Start
//!
//! ```
//! use fmri_glm::prelude::*;
//!
//! let spec = ContrastSpec::new("faces_vs_houses", ContrastType::T)
//!     .with_row([("faces", 1.0), ("houses", -1.0)]);
//! let columns = ["faces", "houses", "trans_x", "constant"];
//!
//! let dense = normalize(Some(&[spec][..]), &columns, UnknownRegressors::Reject).unwrap();
//! assert_eq!(dense[0].weights(), &[vec![1.0, -1.0, 0.0, 0.0]]);
//! ```
//!
//! # Modules
//!
//! - [`contrast`]: Contrast specifications and alignment to design columns
//! - [`regressors`]: Sparse (event) and dense (per-volume) regressor tables
//! - [`design`]: Design requests, drift policy and named design matrices
//! - [`engine`]: Modeling engine contract and the bundled OLS engine
//! - [`matcher`]: Entity-filter selection of first-level maps
//! - [`first_level`]: Single-run driver
//! - [`second_level`]: Group driver
//!
//! Logging goes through `tracing`; install a subscriber to see it.

pub mod contrast;
pub mod design;
pub mod engine;
pub mod entities;
pub mod error;
pub mod first_level;
pub mod matcher;
pub mod prelude;
pub mod primitives;
pub mod regressors;
pub mod second_level;

pub use error::{GlmError, Result};
pub use primitives::Matrix;
