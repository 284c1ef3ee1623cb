//! First-level (single run) model driver.
//!
//! Builds the run's design matrix from its regressor tables, fits it with
//! the configured engine, and writes one effect-size map per contrast into
//! an explicit output directory.
//!
//! # Example
//!
//! ```no_run
//! use fmri_glm::engine::OlsEngine;
//! use fmri_glm::first_level::{FirstLevelInputs, FirstLevelModel, SessionInfo};
//!
//! let inputs = FirstLevelInputs {
//!     bold_file: "sub-01_run-1_bold.json".into(),
//!     mask_file: None,
//!     session_info: SessionInfo {
//!         sparse: Some("sub-01_run-1_regressors.json".into()),
//!         dense: Some("sub-01_run-1_regressors.json".into()),
//!         repetition_time: 2.0,
//!     },
//!     contrasts: None,
//! };
//!
//! let model = FirstLevelModel::new(OlsEngine::new(), "out/sub-01_run-1");
//! let output = model.fit(&inputs).expect("first-level fit");
//! println!("design written to {}", output.design_matrix.display());
//! ```

use crate::contrast::{check_output_names, normalize, ContrastSpec, UnknownRegressors};
use crate::design::{frame_times, resolve_drift_model, DesignRequest, DriftModel};
use crate::engine::{FittedModel, ModelingEngine, OutputType, VolumetricMap};
use crate::entities::Entities;
use crate::error::{GlmError, Result};
use crate::matcher::StatMapRecord;
use crate::regressors::{DenseTable, RegressorStore, SparseTable};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the persisted design matrix.
pub const DESIGN_FILE: &str = "design.tsv";

/// Extension of contrast map files.
pub const MAP_EXTENSION: &str = "json";

/// Acquisition parameters and regressor sources of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Store holding the event table.
    #[serde(default, deserialize_with = "optional_path")]
    pub sparse: Option<PathBuf>,
    /// Store holding the per-volume table.
    #[serde(default, deserialize_with = "optional_path")]
    pub dense: Option<PathBuf>,
    /// Seconds between volumes.
    pub repetition_time: f64,
}

/// Reads an optional path, treating the literal string `"None"` as absent.
fn optional_path<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|s| !s.is_empty() && s != "None")
        .map(PathBuf::from))
}

/// Everything a first-level fit reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstLevelInputs {
    /// BOLD series, one volume per acquisition.
    pub bold_file: PathBuf,
    /// Optional single-volume mask; nonzero voxels are fitted.
    #[serde(default)]
    pub mask_file: Option<PathBuf>,
    /// Timing and regressor sources.
    pub session_info: SessionInfo,
    /// Contrasts to evaluate; absent means none.
    #[serde(default)]
    pub contrasts: Option<Vec<ContrastSpec>>,
}

/// Files and metadata written by a first-level fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstLevelOutput {
    /// Persisted design matrix.
    pub design_matrix: PathBuf,
    /// One effect-size map per contrast, in contrast order.
    pub contrast_maps: Vec<PathBuf>,
    /// `{contrast: <dense weights>, type: "effect"}` per map.
    pub contrast_metadata: Vec<Entities>,
}

impl FirstLevelOutput {
    /// Map records for a second-level pool, with `run` entities merged into
    /// each map's metadata (map metadata wins on conflicts).
    #[must_use]
    pub fn records(&self, run: &Entities) -> Vec<StatMapRecord> {
        self.contrast_maps
            .iter()
            .zip(&self.contrast_metadata)
            .map(|(path, metadata)| {
                let mut merged = run.clone();
                merged.extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
                StatMapRecord::new(path.clone(), merged)
            })
            .collect()
    }
}

/// First-level driver.
#[derive(Debug, Clone)]
pub struct FirstLevelModel<E> {
    engine: E,
    output_dir: PathBuf,
    unknown_regressors: UnknownRegressors,
    drift_model: DriftModel,
}

impl<E: ModelingEngine> FirstLevelModel<E> {
    /// Creates a driver writing into `output_dir`.
    #[must_use]
    pub fn new(engine: E, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            unknown_regressors: UnknownRegressors::default(),
            drift_model: DriftModel::Cosine,
        }
    }

    /// Sets how contrast weights on regressors missing from the design are handled.
    #[must_use]
    pub fn with_unknown_regressors(mut self, policy: UnknownRegressors) -> Self {
        self.unknown_regressors = policy;
        self
    }

    /// Sets the drift basis requested when the dense table brings none.
    #[must_use]
    pub fn with_drift_model(mut self, drift_model: DriftModel) -> Self {
        self.drift_model = drift_model;
        self
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The engine this driver delegates to.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Builds the design request for a run of `n_volumes` volumes.
    ///
    /// # Errors
    ///
    /// Returns an error if a regressor store or table is missing, or the
    /// dense table length differs from `n_volumes`.
    pub fn design_request(&self, info: &SessionInfo, n_volumes: usize) -> Result<DesignRequest> {
        if !(info.repetition_time.is_finite() && info.repetition_time > 0.0) {
            return Err(GlmError::InvalidParameter {
                param: "repetition_time".into(),
                value: info.repetition_time.to_string(),
                constraint: "a finite number of seconds > 0".into(),
            });
        }

        let sparse: Option<SparseTable> = match &info.sparse {
            Some(path) => Some(RegressorStore::open(path)?.sparse()?),
            None => None,
        };
        let dense: Option<DenseTable> = match &info.dense {
            Some(path) => Some(RegressorStore::open(path)?.dense()?),
            None => None,
        };

        if let Some(dense) = &dense {
            if dense.n_rows() != n_volumes {
                return Err(GlmError::dimension_mismatch(
                    "dense regressor rows (volumes)",
                    n_volumes,
                    dense.n_rows(),
                ));
            }
        }

        let drift_model = resolve_drift_model(dense.as_ref(), self.drift_model);
        let events = sparse.map(|table| {
            let events = table.to_events();
            tracing::debug!(
                rows = table.rows().len(),
                kept = events.len(),
                "dropped events with undefined amplitude"
            );
            events
        });

        Ok(DesignRequest {
            frame_times: frame_times(n_volumes, info.repetition_time),
            events,
            confound_names: dense.as_ref().map(DenseTable::column_names),
            confounds: dense,
            drift_model,
        })
    }

    /// Fits the run and writes the design matrix and effect-size maps.
    ///
    /// # Errors
    ///
    /// Returns an error if an input file is missing, a contrast name is not
    /// usable as a file stem, a contrast references unknown regressors (under
    /// [`UnknownRegressors::Reject`]), or the engine fails.
    pub fn fit(&self, inputs: &FirstLevelInputs) -> Result<FirstLevelOutput> {
        let contrasts = inputs.contrasts.as_deref();
        check_output_names(contrasts.unwrap_or_default().iter().map(|c| c.name.as_str()))?;

        let bold = VolumetricMap::load(&inputs.bold_file)?;
        let mask = inputs
            .mask_file
            .as_ref()
            .map(VolumetricMap::load)
            .transpose()?;
        let n_volumes = bold.n_volumes();

        let request = self.design_request(&inputs.session_info, n_volumes)?;
        tracing::info!(
            bold = %inputs.bold_file.display(),
            volumes = n_volumes,
            drift = ?request.drift_model,
            "building first-level design"
        );
        let design = self.engine.build_design_matrix(&request)?;

        fs::create_dir_all(&self.output_dir)?;
        let design_path = self.output_dir.join(DESIGN_FILE);
        design.write_tsv(&design_path)?;

        let fitted = self.engine.fit(&bold, mask.as_ref(), &design)?;

        let dense = normalize(contrasts, design.column_names(), self.unknown_regressors)?;
        let mut contrast_maps = Vec::with_capacity(dense.len());
        let mut contrast_metadata = Vec::with_capacity(dense.len());
        for contrast in &dense {
            let map = fitted.compute_contrast(
                contrast.weights(),
                contrast.contrast_type(),
                OutputType::EffectSize,
            )?;
            let path = self
                .output_dir
                .join(format!("{}.{MAP_EXTENSION}", contrast.name()));
            map.save(&path)?;
            tracing::debug!(contrast = contrast.name(), path = %path.display(), "wrote effect map");

            contrast_maps.push(path);
            contrast_metadata.push(Entities::from([
                ("contrast".to_string(), json!(contrast.weights())),
                ("type".to_string(), json!("effect")),
            ]));
        }

        tracing::info!(contrasts = contrast_maps.len(), "first-level model complete");
        Ok(FirstLevelOutput {
            design_matrix: design_path,
            contrast_maps,
            contrast_metadata,
        })
    }
}

#[cfg(test)]
#[path = "first_level_tests.rs"]
mod tests;
