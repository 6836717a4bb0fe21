//! Working-copy persistence.
//!
//! The [`Checkpointer`] owns the cleansed copy of a dataset: it inserts the
//! leading `Note` column once, takes one verdict per row, and rewrites the
//! copy on disk every `every` rows, on the last row and whenever the runner
//! asks. The source file is never opened for writing.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::events::RowResult;
use super::models::Dataset;
use crate::common::{CleanseError, Result};

pub const NOTE_HEADER: &str = "Note";
pub const WORKING_COPY_SUFFIX: &str = "_cleanse";

/// Sibling of `source` named `<base>_cleanse<ext>`.
pub fn working_copy_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, WORKING_COPY_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, WORKING_COPY_SUFFIX),
    };
    source.with_file_name(name)
}

pub struct Checkpointer {
    path: PathBuf,
    data: Dataset,
    /// Columns inserted in front of the source columns (0 or 1)
    offset: usize,
    every: usize,
    recorded: usize,
    writes: usize,
}

impl Checkpointer {
    /// Build the working copy from `source` and write it once to `path`.
    ///
    /// Fails if `path` is the source file itself.
    pub async fn create(
        source: Dataset,
        source_path: &Path,
        path: impl Into<PathBuf>,
        every: usize,
    ) -> Result<Self> {
        let path = path.into();
        if path == source_path {
            return Err(CleanseError::Checkpoint {
                path: path.display().to_string(),
                reason: "working copy must not overwrite the source dataset".into(),
            });
        }

        let mut data = source;
        let has_note = data
            .headers()
            .first()
            .is_some_and(|h| h.trim().eq_ignore_ascii_case(NOTE_HEADER));
        let offset = if has_note {
            0
        } else {
            data.insert_column(0, NOTE_HEADER);
            1
        };

        let mut checkpointer = Self {
            path,
            data,
            offset,
            every: every.max(1),
            recorded: 0,
            writes: 0,
        };
        checkpointer.checkpoint().await?;
        Ok(checkpointer)
    }

    /// Data rows in the working copy.
    pub fn row_count(&self) -> usize {
        self.data.row_count()
    }

    /// Source cell of data row `row`, addressed by its source column index.
    pub fn cell(&self, row: usize, source_column: usize) -> &str {
        self.data.cell(row, source_column + self.offset)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    /// Completed disk writes, including the initial one.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Store the verdict for `row`, persisting on the periodic and last-row triggers.
    ///
    /// Returns whether a checkpoint was written.
    pub async fn record(&mut self, row: usize, result: &RowResult) -> Result<bool> {
        self.data.set_cell(row, 0, result.as_cell());
        self.recorded += 1;

        let is_last = row + 1 == self.data.row_count();
        if is_last || self.recorded % self.every == 0 {
            self.checkpoint().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Persist the working copy.
    ///
    /// Writes a temporary sibling and renames it over the target so a reader
    /// never sees a half-written file.
    pub async fn checkpoint(&mut self) -> Result<()> {
        let checkpoint_error = |reason: String| CleanseError::Checkpoint {
            path: self.path.display().to_string(),
            reason,
        };

        let bytes = self
            .data
            .to_csv_bytes()
            .map_err(|e| checkpoint_error(e.to_string()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| checkpoint_error(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| checkpoint_error(e.to_string()))?;

        self.writes += 1;
        debug!(
            path = %self.path.display(),
            rows_recorded = self.recorded,
            bytes = bytes.len(),
            "checkpoint written"
        );
        Ok(())
    }
}
