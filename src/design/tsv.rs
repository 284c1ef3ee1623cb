//! Tab-separated persistence for named-column matrices.

use super::DesignMatrix;
use crate::error::{GlmError, Result};
use crate::primitives::Matrix;
use std::path::Path;

/// Header of the index column of a persisted design matrix.
pub const FRAME_TIME_HEADER: &str = "frame_time";

/// Writes `values` with a header row and a leading label column.
///
/// # Errors
///
/// Returns an error if label/name counts disagree with `values` or the write fails.
pub(crate) fn write_labeled_tsv(
    path: &Path,
    index_header: &str,
    labels: &[String],
    names: &[String],
    values: &Matrix<f64>,
) -> Result<()> {
    if labels.len() != values.n_rows() {
        return Err(GlmError::dimension_mismatch("row labels", values.n_rows(), labels.len()));
    }
    if names.len() != values.n_cols() {
        return Err(GlmError::dimension_mismatch("column names", values.n_cols(), names.len()));
    }

    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(std::iter::once(index_header).chain(names.iter().map(String::as_str)))?;
    for (i, label) in labels.iter().enumerate() {
        let mut record = Vec::with_capacity(names.len() + 1);
        record.push(label.clone());
        record.extend(values.row(i).iter().map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

impl DesignMatrix {
    /// Writes the design as TSV: a `frame_time` column followed by one column
    /// per regressor, one row per volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        let labels: Vec<String> = self.frame_times.iter().map(f64::to_string).collect();
        write_labeled_tsv(
            path.as_ref(),
            FRAME_TIME_HEADER,
            &labels,
            &self.names,
            &self.values,
        )
    }

    /// Reads a design written by [`DesignMatrix::write_tsv`].
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::MissingInput`] if the file does not exist, or an
    /// error if a cell is not a number.
    pub fn read_tsv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GlmError::MissingInput {
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_path(path)?;
        let headers = reader.headers()?.clone();
        let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut frame_times = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record?;
            let mut cells = record.iter().map(|cell| {
                cell.trim().parse::<f64>().map_err(|e| {
                    GlmError::InvalidTable(format!(
                        "non-numeric cell '{cell}' in {}: {e}",
                        path.display()
                    ))
                })
            });
            let time = cells
                .next()
                .ok_or_else(|| GlmError::InvalidTable("empty design row".into()))??;
            frame_times.push(time);
            for column in &mut columns {
                let value = cells
                    .next()
                    .ok_or_else(|| GlmError::InvalidTable("short design row".into()))??;
                column.push(value);
            }
        }

        Self::new(frame_times, names.into_iter().zip(columns).collect())
    }
}
