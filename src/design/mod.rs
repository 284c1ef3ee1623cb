//! First-level design matrices.
//!
//! The numerical construction of a design (event resampling, drift bases) is
//! the engine's job; this module owns the request handed to the engine, the
//! drift policy, and the named-column matrix that comes back.

mod tsv;

pub use tsv::FRAME_TIME_HEADER;
pub(crate) use tsv::write_labeled_tsv;

use crate::error::{GlmError, Result};
use crate::primitives::Matrix;
use crate::regressors::{DenseTable, Event};
use serde::{Deserialize, Serialize};

/// Name of the first cosine drift column. A dense table carrying it already
/// models drift, so the engine must not add another basis.
pub const COSINE_DRIFT_COLUMN: &str = "cosine_00";

/// Low-frequency drift basis appended by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftModel {
    /// Discrete cosine basis up to the engine's high-pass cutoff.
    Cosine,
    /// Orthogonal polynomials of degree 1 through `order`.
    Polynomial {
        /// Highest degree
        order: usize,
    },
}

/// Chooses the drift basis for a run.
///
/// Caller-supplied drift wins: when `dense` already has a
/// [`COSINE_DRIFT_COLUMN`] column no basis is requested. Otherwise `default`
/// is returned.
///
/// # Examples
///
/// ```
/// use fmri_glm::design::{resolve_drift_model, DriftModel};
/// use fmri_glm::regressors::DenseTable;
///
/// let dense = DenseTable::new(vec![("cosine_00".to_string(), vec![1.0, -1.0])]).unwrap();
/// assert_eq!(resolve_drift_model(Some(&dense), DriftModel::Cosine), None);
/// assert_eq!(resolve_drift_model(None, DriftModel::Cosine), Some(DriftModel::Cosine));
/// ```
#[must_use]
pub fn resolve_drift_model(dense: Option<&DenseTable>, default: DriftModel) -> Option<DriftModel> {
    match dense {
        Some(table) if table.contains(COSINE_DRIFT_COLUMN) => None,
        _ => Some(default),
    }
}

/// Everything the engine needs to build a first-level design.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignRequest {
    /// Acquisition time of every volume, in seconds.
    pub frame_times: Vec<f64>,
    /// Renamed, filtered events.
    pub events: Option<Vec<Event>>,
    /// Per-volume regressors.
    pub confounds: Option<DenseTable>,
    /// Names of the confound columns to include, in order.
    pub confound_names: Option<Vec<String>>,
    /// Drift basis to append, if any.
    pub drift_model: Option<DriftModel>,
}

/// Frame times `index * repetition_time` for `n_volumes` volumes.
#[must_use]
pub fn frame_times(n_volumes: usize, repetition_time: f64) -> Vec<f64> {
    (0..n_volumes).map(|i| i as f64 * repetition_time).collect()
}

/// Design matrix with named columns, one row per volume.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    frame_times: Vec<f64>,
    names: Vec<String>,
    values: Matrix<f64>,
}

impl DesignMatrix {
    /// Assembles a design from named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if a column's length differs from `frame_times`, a
    /// name is empty or repeated, or there are no columns.
    pub fn new(frame_times: Vec<f64>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(GlmError::InvalidTable(
                "design matrix must have at least one column".into(),
            ));
        }
        let n = frame_times.len();
        for (i, (name, values)) in columns.iter().enumerate() {
            if name.is_empty() {
                return Err(GlmError::InvalidTable("column names cannot be empty".into()));
            }
            if columns[..i].iter().any(|(other, _)| other == name) {
                return Err(GlmError::InvalidTable(format!(
                    "duplicate design column '{name}'"
                )));
            }
            if values.len() != n {
                return Err(GlmError::dimension_mismatch(
                    &format!("rows of design column '{name}'"),
                    n,
                    values.len(),
                ));
            }
        }

        let slices: Vec<&[f64]> = columns.iter().map(|(_, v)| v.as_slice()).collect();
        let values = Matrix::from_columns(n, &slices)
            .map_err(|e| GlmError::InvalidTable(e.to_string()))?;
        let names = columns.into_iter().map(|(name, _)| name).collect();

        Ok(Self {
            frame_times,
            names,
            values,
        })
    }

    /// Column names in design order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Frame time of each row.
    #[must_use]
    pub fn frame_times(&self) -> &[f64] {
        &self.frame_times
    }

    /// Number of rows (volumes or second-level inputs).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.values.n_rows()
    }

    /// Number of regressors.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.values.n_cols()
    }

    /// Regressor values, rows × columns.
    #[must_use]
    pub fn values(&self) -> &Matrix<f64> {
        &self.values
    }

    /// Values of one regressor, if present.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values.column(idx))
    }
}

#[cfg(test)]
#[path = "design_tests.rs"]
mod tests;
