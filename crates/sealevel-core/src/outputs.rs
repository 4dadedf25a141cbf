use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result, Stage};
use crate::pipelines::FinalSeries;

pub const OUTPUT_HEADER: [&str; 2] = ["time", "sealevel"];
pub const DEFAULT_MISSING_MARKER: &str = "NaN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormat {
    pub delimiter: u8,
    pub missing_marker: String,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            missing_marker: DEFAULT_MISSING_MARKER.to_string(),
        }
    }
}

/// Writes the header and one row per sample, in series order. Returns the
/// number of data rows written.
pub fn write_series<W: Write>(
    series: &FinalSeries,
    writer: W,
    format: &OutputFormat,
) -> Result<usize> {
    let csv_err = |source: csv::Error| PipelineError::Csv {
        stage: Stage::Serialize,
        source,
    };

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(format.delimiter)
        .from_writer(writer);

    wtr.write_record(OUTPUT_HEADER).map_err(csv_err)?;
    for row in &series.rows {
        let value = row
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| format.missing_marker.clone());
        wtr.write_record([row.timestamp.render(), value])
            .map_err(csv_err)?;
    }
    wtr.flush()
        .map_err(|err| PipelineError::io(Stage::Serialize, err))?;

    Ok(series.rows.len())
}

pub fn render_series(series: &FinalSeries, format: &OutputFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_series(series, &mut buffer, format)?;
    Ok(buffer)
}

/// A per-run output file in a scratch directory.
///
/// Each artifact gets a fresh `sealevel-<uuid>-<cadence>.csv` name, so runs
/// sharing a directory never collide. The file is removed when the artifact is
/// dropped unless [`OutputArtifact::persist`] moved it to its destination.
#[derive(Debug)]
pub struct OutputArtifact {
    path: PathBuf,
    rows: usize,
    persisted: bool,
}

impl OutputArtifact {
    pub fn write(dir: &Path, series: &FinalSeries, format: &OutputFormat) -> Result<Self> {
        let file_name = format!("sealevel-{}-{}.csv", Uuid::new_v4(), series.cadence);
        let path = dir.join(file_name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| PipelineError::io(Stage::Serialize, err))?;

        // Owns the path from here on so a failed write still cleans up.
        let mut artifact = Self {
            path,
            rows: 0,
            persisted: false,
        };
        artifact.rows = Self::fill(file, series, format)?;
        debug!(path = %artifact.path.display(), rows = artifact.rows, "wrote output artifact");
        Ok(artifact)
    }

    fn fill(file: File, series: &FinalSeries, format: &OutputFormat) -> Result<usize> {
        let mut writer = BufWriter::new(file);
        let rows = write_series(series, &mut writer, format)?;
        writer
            .into_inner()
            .map_err(|err| PipelineError::io(Stage::Serialize, err.into_error()))?
            .sync_all()
            .map_err(|err| PipelineError::io(Stage::Serialize, err))?;
        Ok(rows)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|err| PipelineError::io(Stage::Serialize, err))
    }

    /// Moves the artifact to `dest`, falling back to copy-and-remove when a rename
    /// is not possible (for example across filesystems).
    pub fn persist(mut self, dest: &Path) -> Result<PathBuf> {
        if fs::rename(&self.path, dest).is_err() {
            fs::copy(&self.path, dest).map_err(|err| PipelineError::io(Stage::Serialize, err))?;
            if let Err(err) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), %err, "failed to remove scratch artifact");
            }
        }
        self.persisted = true;
        Ok(dest.to_path_buf())
    }
}

impl Drop for OutputArtifact {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), %err, "failed to clean up output artifact");
            }
        }
    }
}
