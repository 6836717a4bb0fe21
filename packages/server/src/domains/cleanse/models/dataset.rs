//! Tabular dataset and column resolution.
//!
//! Rows arrive already parsed; this module only holds them, resolves the
//! required columns by header, and reads/writes the CSV form used for the
//! working copy.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::job::Platform;
use crate::common::{CleanseError, Result};

/// Header row plus data rows, all cells as text.
///
/// Every row is padded to the header width, and the header is widened if a
/// row carries more cells than it names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(mut headers: Vec<String>, mut rows: Vec<Vec<String>>) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(headers.len());
        headers.resize(width, String::new());
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cell text, or `""` when out of range.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Overwrite a cell; out-of-range writes are ignored.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.into();
        }
    }

    /// Insert a column at `index` with an empty cell in every row.
    pub fn insert_column(&mut self, index: usize, header: impl Into<String>) {
        let index = index.min(self.headers.len());
        self.headers.insert(index, header.into());
        for row in &mut self.rows {
            row.insert(index, String::new());
        }
    }

    /// Case-insensitive, whitespace-trimmed header lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.headers
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
    }

    /// Parse CSV with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self::new(headers, rows))
    }

    pub async fn read_csv(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_csv_reader(bytes.as_slice())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| CleanseError::Io(e.into_error()))
    }
}

/// Header names the caller picked for the four verified columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSelection {
    pub full_name: String,
    pub job_title: String,
    pub company: String,
    pub url: String,
}

impl ColumnSelection {
    /// Conventional headers for `platform`.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            full_name: "Full Name".into(),
            job_title: "Job Title".into(),
            company: "Company".into(),
            url: platform.default_url_column().into(),
        }
    }
}

/// Resolved zero-based column indices, fixed for the job's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub full_name: usize,
    pub job_title: usize,
    pub company: usize,
    pub url: usize,
}

impl ColumnMapping {
    /// Resolve every selected header, reporting all missing ones at once.
    pub fn resolve(dataset: &Dataset, selection: &ColumnSelection) -> Result<Self> {
        let mut missing = Vec::new();
        let mut lookup = |name: &str| match dataset.column_index(name) {
            Some(index) => index,
            None => {
                missing.push(format!("\"{}\"", name.trim()));
                0
            }
        };

        let mapping = Self {
            full_name: lookup(&selection.full_name),
            job_title: lookup(&selection.job_title),
            company: lookup(&selection.company),
            url: lookup(&selection.url),
        };

        if missing.is_empty() {
            Ok(mapping)
        } else {
            Err(CleanseError::Validation(format!(
                "missing column(s) {}",
                missing.join(", ")
            )))
        }
    }
}
