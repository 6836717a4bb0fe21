use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{CleanseError, JobId, OwnerId, Result};

/// Markup profile of the target site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "salesnav")]
    SalesNav,
    #[serde(rename = "linkedin")]
    LinkedIn,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::SalesNav => "salesnav",
            Platform::LinkedIn => "linkedin",
        }
    }

    /// Header of the URL column when the request doesn't name one.
    pub fn default_url_column(&self) -> &'static str {
        match self {
            Platform::SalesNav => "Sales Navigator URL",
            Platform::LinkedIn => "LinkedIn URL",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CleanseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "salesnav" | "sales_nav" | "sales navigator" => Ok(Platform::SalesNav),
            "linkedin" => Ok(Platform::LinkedIn),
            other => Err(CleanseError::Validation(format!(
                "unsupported platform: {}",
                other
            ))),
        }
    }
}

/// Job lifecycle status.
///
/// `Running` is left exactly once, for one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
    Stopped,
    Error,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }
}

/// Durable record of one cleanse job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJob {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub platform: Platform,
    /// Original dataset; never written to
    pub source_path: PathBuf,
    /// Working copy that receives the verdicts
    pub working_copy_path: PathBuf,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeJob {
    /// New running job.
    pub fn new(
        owner_id: OwnerId,
        platform: Platform,
        source_path: impl Into<PathBuf>,
        working_copy_path: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner_id,
            platform,
            source_path: source_path.into(),
            working_copy_path: working_copy_path.into(),
            status: JobStatus::Running,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn working_copy(&self) -> &Path {
        &self.working_copy_path
    }

    /// Leave `Running` for a terminal status.
    ///
    /// Fails if the job already finished or `status` is `Running`.
    pub fn finish(&mut self, status: JobStatus, error: Option<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CleanseError::Store(format!(
                "job {} already finished as {:?}",
                self.id, self.status
            )));
        }
        if status.is_running() {
            return Err(CleanseError::Store(format!(
                "job {} cannot re-enter running",
                self.id
            )));
        }
        self.status = status;
        self.error = error;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ScrapeJob {
        ScrapeJob::new(
            OwnerId::new(),
            Platform::SalesNav,
            "/tmp/leads.csv",
            "/tmp/leads_cleanse.csv",
        )
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("SalesNav".parse::<Platform>().unwrap(), Platform::SalesNav);
        assert_eq!("linkedin".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert!("xing".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serde() {
        assert_eq!(
            serde_json::to_string(&Platform::SalesNav).unwrap(),
            "\"salesnav\""
        );
        let platform: Platform = serde_json::from_str("\"linkedin\"").unwrap();
        assert_eq!(platform, Platform::LinkedIn);
    }

    #[test]
    fn test_finish_exactly_once() {
        let mut job = job();
        job.finish(JobStatus::Done, None).unwrap();
        assert_eq!(job.status, JobStatus::Done);

        assert!(job.finish(JobStatus::Error, Some("late".into())).is_err());
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_cannot_finish_as_running() {
        let mut job = job();
        assert!(job.finish(JobStatus::Running, None).is_err());
        assert!(job.status.is_running());
    }
}
