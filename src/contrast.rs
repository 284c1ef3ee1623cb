//! Contrast specification and normalization.
//!
//! Users author contrasts sparsely: each weight row names only the regressors
//! it cares about. Before a contrast can be evaluated it has to be expanded
//! into dense rows aligned 1:1 with the columns of the design matrix that was
//! actually built for the run, which may contain more (or fewer) regressors
//! than the author anticipated.
//!
//! # Example
//!
//! ```
//! use fmri_glm::contrast::{normalize, ContrastSpec, ContrastType, UnknownRegressors};
//!
//! let spec = ContrastSpec::new("faces_vs_houses", ContrastType::T)
//!     .with_row([("faces", 1.0), ("houses", -1.0)]);
//! let columns = ["houses", "faces", "trans_x", "constant"];
//!
//! let dense = normalize(Some(&[spec][..]), &columns, UnknownRegressors::Reject)
//!     .expect("every weight key is a design column");
//! assert_eq!(dense[0].weights(), &[vec![-1.0, 1.0, 0.0, 0.0]]);
//! ```

use crate::error::{GlmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Statistic a contrast is evaluated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContrastType {
    /// Single-row t contrast.
    #[serde(rename = "t")]
    T,
    /// Multi-row F contrast.
    #[serde(rename = "F")]
    F,
    /// Raw effect estimate, no statistic.
    #[serde(rename = "effect")]
    Effect,
}

impl ContrastType {
    /// Serialized name (`t`, `F`, `effect`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::T => "t",
            Self::F => "F",
            Self::Effect => "effect",
        }
    }
}

impl fmt::Display for ContrastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sparse weight row: regressor name → weight. Omitted names weigh zero.
pub type WeightRow = BTreeMap<String, f64>;

/// A named contrast as authored by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastSpec {
    /// Contrast name, also used as the output file stem.
    pub name: String,

    /// Statistic type.
    #[serde(rename = "type")]
    pub contrast_type: ContrastType,

    /// Sparse weight rows.
    pub weights: Vec<WeightRow>,
}

impl ContrastSpec {
    /// Creates a contrast without weight rows.
    #[must_use]
    pub fn new(name: impl Into<String>, contrast_type: ContrastType) -> Self {
        Self {
            name: name.into(),
            contrast_type,
            weights: Vec::new(),
        }
    }

    /// Appends a sparse weight row.
    #[must_use]
    pub fn with_row<I, K>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.weights
            .push(row.into_iter().map(|(k, w)| (k.into(), w)).collect());
        self
    }

    /// Regressor names referenced by any row but absent from `known`, sorted.
    fn unknown_regressors(&self, known: &HashSet<&str>) -> Vec<String> {
        self.weights
            .iter()
            .flat_map(|row| row.keys())
            .filter(|key| !known.contains(key.as_str()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A contrast whose rows are aligned with a concrete list of design columns.
///
/// Produced only by [`normalize`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenseContrast {
    name: String,
    #[serde(rename = "type")]
    contrast_type: ContrastType,
    weights: Vec<Vec<f64>>,
}

impl DenseContrast {
    /// Contrast name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Statistic type.
    #[must_use]
    pub fn contrast_type(&self) -> ContrastType {
        self.contrast_type
    }

    /// Dense weight rows, each as long as the column list it was normalized against.
    #[must_use]
    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }
}

/// What [`normalize`] does with weight keys that are not design columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownRegressors {
    /// Fail with [`GlmError::UnknownRegressor`].
    #[default]
    Reject,
    /// Drop the weight and log a warning.
    Ignore,
}

/// Expands sparse contrasts into dense rows aligned with `columns`.
///
/// `None` and an empty slice both yield an empty vector. Output order follows
/// input order for contrasts and for rows within a contrast.
///
/// # Errors
///
/// With [`UnknownRegressors::Reject`], returns [`GlmError::UnknownRegressor`]
/// for the first contrast that names a regressor absent from `columns`.
pub fn normalize<S: AsRef<str>>(
    contrasts: Option<&[ContrastSpec]>,
    columns: &[S],
    policy: UnknownRegressors,
) -> Result<Vec<DenseContrast>> {
    let Some(contrasts) = contrasts else {
        return Ok(Vec::new());
    };
    let known: HashSet<&str> = columns.iter().map(AsRef::as_ref).collect();

    let mut dense = Vec::with_capacity(contrasts.len());
    for contrast in contrasts {
        let unknown = contrast.unknown_regressors(&known);
        if !unknown.is_empty() {
            match policy {
                UnknownRegressors::Reject => {
                    return Err(GlmError::UnknownRegressor {
                        contrast: contrast.name.clone(),
                        regressors: unknown,
                    });
                }
                UnknownRegressors::Ignore => {
                    tracing::warn!(
                        contrast = %contrast.name,
                        regressors = ?unknown,
                        "dropping weights for regressors absent from the design matrix"
                    );
                }
            }
        }

        let weights = contrast
            .weights
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col.as_ref()).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        dense.push(DenseContrast {
            name: contrast.name.clone(),
            contrast_type: contrast.contrast_type,
            weights,
        });
    }

    Ok(dense)
}

/// Checks that contrast names can serve as distinct file stems in one directory.
pub(crate) fn check_output_names<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() || name == "." || name == ".." {
            return Err(GlmError::invalid_contrast(name, "not usable as a file name"));
        }
        if name.contains(|c: char| c == '/' || c == '\\') {
            return Err(GlmError::invalid_contrast(name, "contains a path separator"));
        }
        if !seen.insert(name) {
            return Err(GlmError::invalid_contrast(name, "duplicate contrast name"));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "contrast_tests.rs"]
mod tests;
