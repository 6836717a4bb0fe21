//! Row verdicts and job log events.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::models::Platform;

/// Value written into the leading "Note" column for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowResult {
    Good,
    Bad,
    Locked,
    Error,
    /// Keywords found on the page; replaces `good`
    Keywords(Vec<String>),
    /// Empty cell (locked-row convention variant)
    Blank,
}

impl RowResult {
    /// Text stored in the working copy.
    pub fn as_cell(&self) -> String {
        match self {
            RowResult::Good => "good".into(),
            RowResult::Bad => "bad".into(),
            RowResult::Locked => "locked".into(),
            RowResult::Error => "error".into(),
            RowResult::Keywords(keywords) => keywords.join(","),
            RowResult::Blank => String::new(),
        }
    }
}

impl fmt::Display for RowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_cell())
    }
}

/// How locked profiles are recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockedNote {
    /// Write `locked`
    #[default]
    Locked,
    /// Leave the cell empty
    Blank,
}

impl LockedNote {
    pub fn row_result(&self) -> RowResult {
        match self {
            LockedNote::Locked => RowResult::Locked,
            LockedNote::Blank => RowResult::Blank,
        }
    }
}

/// Identity fields read from a profile page, lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub full_name: String,
    pub job_title: String,
    pub company: String,
    pub connection_count: u32,
}

/// Sheet values a row is verified against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedFields {
    pub full_name: String,
    pub job_title: String,
    pub company: String,
    pub min_connections: u32,
}

impl ExpectedFields {
    /// Trim and lowercase sheet cells.
    pub fn from_cells(full_name: &str, job_title: &str, company: &str, min_connections: u32) -> Self {
        Self {
            full_name: full_name.trim().to_lowercase(),
            job_title: job_title.trim().to_lowercase(),
            company: company.trim().to_lowercase(),
            min_connections,
        }
    }
}

/// Field-by-field comparison outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatches {
    pub full_name: bool,
    pub job_title: bool,
    pub company: bool,
    pub connection_count: bool,
}

impl FieldMatches {
    /// Compare page values with sheet values.
    ///
    /// Text fields must be equal after trim + lowercase; the connection count
    /// must reach the threshold.
    pub fn compare(expected: &ExpectedFields, found: &ProfileFields) -> Self {
        let same = |a: &str, b: &str| a.trim().to_lowercase() == b.trim().to_lowercase();
        Self {
            full_name: same(&expected.full_name, &found.full_name),
            job_title: same(&expected.job_title, &found.job_title),
            company: same(&expected.company, &found.company),
            connection_count: found.connection_count >= expected.min_connections,
        }
    }

    pub fn all(&self) -> bool {
        self.full_name && self.job_title && self.company && self.connection_count
    }
}

/// Diagnostic payload attached to a verified row's log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub platform: Platform,
    pub matches: FieldMatches,
    pub expected: ExpectedFields,
    pub found: ProfileFields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// One entry in a job's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<MatchDetail>,
    /// Working-copy reference on events that end the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl LogEvent {
    pub fn new(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            row: None,
            matches: None,
            file_path: None,
        }
    }

    pub fn for_row(status: impl Into<String>, row: usize, message: impl Into<String>) -> Self {
        Self::new(status, message).with_row(row)
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_matches(mut self, detail: MatchDetail) -> Self {
        self.matches = Some(detail);
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}
