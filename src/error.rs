//! Error types for GLM pipeline operations.
//!
//! Every variant is fatal for the unit of work that raised it: the drivers
//! never continue with a partial set of inputs or outputs.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the GLM pipeline.
///
/// # Examples
///
/// ```
/// use fmri_glm::error::GlmError;
///
/// let err = GlmError::DegenerateContrast {
///     name: "group_mean".to_string(),
/// };
/// assert!(err.to_string().contains("group_mean"));
/// ```
#[derive(Error, Debug)]
pub enum GlmError {
    /// Required input file does not exist.
    #[error("missing input file: {}", path.display())]
    MissingInput {
        /// Path that was expected to exist
        path: PathBuf,
    },

    /// Keyed table is absent from a regressor store.
    #[error("missing table '{key}' in {}", path.display())]
    MissingTable {
        /// Table key (`sparse` or `dense`)
        key: String,
        /// Store that was searched
        path: PathBuf,
    },

    /// A second-level entity filter matched no record in the pool.
    #[error("no matching run found for contrast filter {filter}")]
    UnmatchedFilter {
        /// Filter rendered as JSON
        filter: String,
    },

    /// A second-level contrast selects no input maps.
    #[error("degenerate contrast '{name}': every weight is zero, intercept model has no inputs")]
    DegenerateContrast {
        /// Contrast name
        name: String,
    },

    /// Contrast weights reference regressors absent from the design matrix.
    #[error("contrast '{contrast}' references unknown regressors: {}", regressors.join(", "))]
    UnknownRegressor {
        /// Contrast name
        contrast: String,
        /// Unknown regressor names, sorted
        regressors: Vec<String>,
    },

    /// Contrast cannot be written or evaluated as given.
    #[error("invalid contrast '{name}': {reason}")]
    InvalidContrast {
        /// Contrast name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Parameter outside its valid range.
    #[error("invalid parameter: {param} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Regressor or design table is malformed.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// Dimensions of two collaborating inputs disagree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Design matrix is rank deficient or has no residual degrees of freedom.
    #[error("singular design: {0}")]
    SingularDesign(String),

    /// Generic error with string message.
    #[error("{0}")]
    Other(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delimited table read/write error.
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl GlmError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an invalid contrast error
    #[must_use]
    pub fn invalid_contrast(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidContrast {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, GlmError>;
