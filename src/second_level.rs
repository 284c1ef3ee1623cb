//! Second-level (group) model driver.
//!
//! Each group contrast is an intercept-only model over a subset of
//! first-level maps. The maps are located by entity filter through
//! [`match_runs`], never by position, and the contrast weights both select
//! the maps (nonzero entries) and form the single design column.

use crate::contrast::{check_output_names, ContrastType};
use crate::design::{write_labeled_tsv, DesignMatrix};
use crate::engine::{FittedModel, ModelingEngine, OutputType, VolumetricMap};
use crate::entities::{common_entities, Entities};
use crate::error::{GlmError, Result};
use crate::first_level::MAP_EXTENSION;
use crate::matcher::{flatten, match_runs, StatMapRecord};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the single second-level design column.
pub const INTERCEPT_COLUMN: &str = "intercept";

/// File name of the persisted contrast matrix.
pub const CONTRAST_MATRIX_FILE: &str = "contrast_matrix.tsv";

const INPUT_HEADER: &str = "input";

/// A group contrast: one weight per entity filter, in filter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupContrast {
    /// Contrast name, also used as the output file stem.
    pub name: String,
    /// Statistic computed for the intercept.
    #[serde(rename = "type")]
    pub contrast_type: ContrastType,
    /// Weight per matched map; zero excludes the map.
    pub weights: Vec<f64>,
}

impl GroupContrast {
    /// Creates a contrast.
    #[must_use]
    pub fn new(name: impl Into<String>, contrast_type: ContrastType, weights: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            contrast_type,
            weights,
        }
    }

    /// Indices and values of the nonzero weights.
    fn nonzero(&self) -> Vec<(usize, f64)> {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0.0)
            .map(|(i, w)| (i, *w))
            .collect()
    }
}

/// Everything a second-level fit reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecondLevelInputs {
    /// First-level maps, grouped per run or subject.
    pub stat_maps: Vec<Vec<StatMapRecord>>,
    /// One filter per model input.
    pub filters: Vec<Entities>,
    /// Contrasts over the filtered inputs.
    pub contrasts: Vec<GroupContrast>,
    /// Entity sets whose common part labels every output.
    #[serde(default)]
    pub contrast_indices: Vec<Entities>,
}

/// Files and metadata written by a second-level fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondLevelOutput {
    /// One statistic map per contrast, in contrast order.
    pub contrast_maps: Vec<PathBuf>,
    /// Metadata per map.
    pub contrast_metadata: Vec<Entities>,
    /// Persisted inputs × contrasts weight matrix.
    pub contrast_matrix: PathBuf,
}

impl SecondLevelOutput {
    /// Group result records.
    #[must_use]
    pub fn records(&self) -> Vec<StatMapRecord> {
        self.contrast_maps
            .iter()
            .zip(&self.contrast_metadata)
            .map(|(path, metadata)| StatMapRecord::new(path.clone(), metadata.clone()))
            .collect()
    }
}

/// Second-level driver.
#[derive(Debug, Clone)]
pub struct SecondLevelModel<E> {
    engine: E,
    output_dir: PathBuf,
}

impl<E: ModelingEngine> SecondLevelModel<E> {
    /// Creates a driver writing into `output_dir`.
    #[must_use]
    pub fn new(engine: E, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
        }
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fits every group contrast.
    ///
    /// All filters are resolved and all contrasts validated before the first
    /// fit, so a configuration error leaves no statistic maps behind.
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::UnmatchedFilter`] if a filter matches no map,
    /// [`GlmError::DimensionMismatch`] if a contrast has the wrong number of
    /// weights, [`GlmError::DegenerateContrast`] if a contrast has no nonzero
    /// weight, or an engine or I/O error.
    pub fn fit(&self, inputs: &SecondLevelInputs) -> Result<SecondLevelOutput> {
        let pool = flatten(&inputs.stat_maps);
        let matched = match_runs(&pool, &inputs.filters)?;
        tracing::info!(
            pool = pool.len(),
            inputs = matched.len(),
            contrasts = inputs.contrasts.len(),
            "matched second-level inputs"
        );

        check_output_names(inputs.contrasts.iter().map(|c| c.name.as_str()))?;
        let mut selections = Vec::with_capacity(inputs.contrasts.len());
        for contrast in &inputs.contrasts {
            if contrast.weights.len() != matched.len() {
                return Err(GlmError::dimension_mismatch(
                    &format!("weights of contrast '{}' (filters)", contrast.name),
                    matched.len(),
                    contrast.weights.len(),
                ));
            }
            let selected = contrast.nonzero();
            if selected.is_empty() {
                return Err(GlmError::DegenerateContrast {
                    name: contrast.name.clone(),
                });
            }
            selections.push(selected);
        }

        fs::create_dir_all(&self.output_dir)?;
        let contrast_matrix = self.write_contrast_matrix(&matched, &inputs.contrasts)?;

        let base = if inputs.contrast_indices.is_empty() {
            common_entities(&inputs.filters)
        } else {
            common_entities(&inputs.contrast_indices)
        };

        let mut contrast_maps = Vec::with_capacity(inputs.contrasts.len());
        let mut contrast_metadata = Vec::with_capacity(inputs.contrasts.len());
        for (contrast, selected) in inputs.contrasts.iter().zip(&selections) {
            let map = self.fit_contrast(contrast, selected, &matched)?;
            let path = self.output_dir.join(format!("{}.{MAP_EXTENSION}", contrast.name));
            map.save(&path)?;
            tracing::debug!(
                contrast = %contrast.name,
                inputs = selected.len(),
                path = %path.display(),
                "wrote group map"
            );

            let mut metadata = base.clone();
            metadata.insert("type".to_string(), json!("stat"));
            metadata.insert("contrast".to_string(), json!(contrast.weights));
            contrast_maps.push(path);
            contrast_metadata.push(metadata);
        }

        tracing::info!(contrasts = contrast_maps.len(), "second-level model complete");
        Ok(SecondLevelOutput {
            contrast_maps,
            contrast_metadata,
            contrast_matrix,
        })
    }

    fn fit_contrast(
        &self,
        contrast: &GroupContrast,
        selected: &[(usize, f64)],
        matched: &[StatMapRecord],
    ) -> Result<VolumetricMap> {
        let maps = selected
            .iter()
            .map(|(i, _)| VolumetricMap::load(&matched[*i].file_path))
            .collect::<Result<Vec<_>>>()?;
        let data = VolumetricMap::stack(&maps)?;

        let design = DesignMatrix::new(
            selected.iter().map(|(i, _)| *i as f64).collect(),
            vec![(
                INTERCEPT_COLUMN.to_string(),
                selected.iter().map(|(_, w)| *w).collect(),
            )],
        )?;

        let output = match contrast.contrast_type {
            ContrastType::Effect => OutputType::EffectSize,
            ContrastType::T | ContrastType::F => OutputType::Stat,
        };
        let fitted = self.engine.fit(&data, None, &design)?;
        fitted.compute_contrast(&[vec![1.0]], contrast.contrast_type, output)
    }

    fn write_contrast_matrix(
        &self,
        matched: &[StatMapRecord],
        contrasts: &[GroupContrast],
    ) -> Result<PathBuf> {
        let labels: Vec<String> = matched
            .iter()
            .map(|record| {
                record
                    .file_path
                    .file_stem()
                    .map_or_else(
                        || record.file_path.display().to_string(),
                        |stem| stem.to_string_lossy().into_owned(),
                    )
            })
            .collect();
        let names: Vec<String> = contrasts.iter().map(|c| c.name.clone()).collect();

        let mut values = Matrix::zeros(matched.len(), contrasts.len());
        for (j, contrast) in contrasts.iter().enumerate() {
            for (i, w) in contrast.weights.iter().enumerate() {
                values.set(i, j, *w);
            }
        }

        let path = self.output_dir.join(CONTRAST_MATRIX_FILE);
        write_labeled_tsv(&path, INPUT_HEADER, &labels, &names, &values)?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "second_level_tests.rs"]
mod tests;
