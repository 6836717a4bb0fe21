//! Job control surface.
//!
//! [`CleanseService`] is what the HTTP routes call: upload a dataset, start a
//! job, watch it, stop it, list running jobs and download the working copy.
//! Every operation that names a job checks that the caller owns it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Deserialize;
use tracing::{info, info_span, Instrument};

use super::broadcaster::{EventBroadcaster, StreamItem};
use super::checkpoint::working_copy_path;
use super::events::LogEvent;
use super::models::{ColumnMapping, ColumnSelection, Dataset, JobStore, Platform, ScrapeJob};
use super::registry::JobRegistry;
use super::runner::{JobContext, JobRunner, RunnerSettings, VerifyConfig};
use super::stop::StopController;
use crate::common::{CleanseError, JobId, OwnerId, Result};
use crate::kernel::{BrowserIdentity, BrowserProvider};

/// Body of a start request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    pub platform: Platform,
    /// Name of a dataset previously uploaded by the caller
    pub file_name: String,
    /// Header names to verify against; platform defaults when absent
    #[serde(default)]
    pub columns: Option<ColumnSelection>,
    #[serde(flatten)]
    pub verify: VerifyConfig,
    pub identity: BrowserIdentity,
}

/// Working copy ready to be sent back to the caller.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct CleanseService {
    store: Arc<dyn JobStore>,
    registry: JobRegistry,
    provider: Arc<dyn BrowserProvider>,
    broadcaster: EventBroadcaster,
    stop: StopController,
    settings: RunnerSettings,
    upload_dir: PathBuf,
}

impl CleanseService {
    pub fn new(
        store: Arc<dyn JobStore>,
        provider: Arc<dyn BrowserProvider>,
        settings: RunnerSettings,
        upload_dir: impl Into<PathBuf>,
        stream_poll_interval: Duration,
    ) -> Self {
        let registry = JobRegistry::new();
        Self {
            broadcaster: EventBroadcaster::new(registry.clone(), store.clone(), stream_poll_interval),
            stop: StopController::new(registry.clone()),
            store,
            registry,
            provider,
            settings,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    fn owner_dir(&self, owner: OwnerId) -> PathBuf {
        self.upload_dir.join(owner.to_string())
    }

    /// Store an uploaded CSV dataset under the caller's directory.
    ///
    /// The bytes must parse as a CSV with a header row.
    pub async fn upload(&self, owner: OwnerId, file_name: &str, bytes: &[u8]) -> Result<String> {
        let file_name = plain_file_name(file_name)?;
        let dataset = Dataset::from_csv_reader(bytes)
            .map_err(|e| CleanseError::Validation(format!("unreadable dataset: {}", e)))?;

        let dir = self.owner_dir(owner);
        let path = dir.join(&file_name);
        if self.registry.is_claimed(&path) {
            return Err(CleanseError::Conflict(format!(
                "\"{}\" is in use by a running job",
                file_name
            )));
        }
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&path, bytes).await?;

        info!(
            owner_id = %owner,
            file_name = %file_name,
            rows = dataset.row_count(),
            "dataset uploaded"
        );
        Ok(file_name)
    }

    /// Validate and launch a job. Column problems are reported here; the job
    /// itself runs in the background.
    ///
    /// A dataset can back one running job at a time: its source and working
    /// copy stay claimed until the job finishes.
    pub async fn start(&self, owner: OwnerId, request: StartJobRequest) -> Result<JobId> {
        let file_name = plain_file_name(&request.file_name)?;
        let source_path = self.owner_dir(owner).join(&file_name);
        let source = match Dataset::read_csv(&source_path).await {
            Ok(source) => source,
            Err(CleanseError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CleanseError::Validation(format!(
                    "dataset \"{}\" has not been uploaded",
                    file_name
                )))
            }
            Err(e) => return Err(e),
        };

        let selection = request
            .columns
            .unwrap_or_else(|| ColumnSelection::for_platform(request.platform));
        let mapping = ColumnMapping::resolve(&source, &selection)?;

        let working_copy = working_copy_path(&source_path);
        let job = ScrapeJob::new(owner, request.platform, source_path.clone(), working_copy.clone());
        let job_id = job.id;
        if let Err(taken) = self
            .registry
            .claim_paths(job_id, &[source_path.as_path(), working_copy.as_path()])
        {
            let name = taken
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(CleanseError::Conflict(format!(
                "a running job already uses \"{}\"",
                name
            )));
        }
        if let Err(e) = self.store.insert(&job).await {
            self.registry.release_paths(job_id);
            return Err(e);
        }
        self.registry.register(job_id);
        self.registry
            .append_log(job_id, LogEvent::new("Started", "Job created"));

        info!(
            job_id = %job_id,
            owner_id = %owner,
            platform = %job.platform,
            rows = source.row_count(),
            "starting cleanse job"
        );

        let ctx = JobContext::builder()
            .job(job)
            .source(source)
            .mapping(mapping)
            .verify(request.verify)
            .identity(request.identity)
            .settings(self.settings.clone())
            .build();
        let runner = JobRunner::new(
            ctx,
            self.provider.clone(),
            self.store.clone(),
            self.registry.clone(),
        );
        tokio::spawn(runner.run().instrument(info_span!("cleanse_job", job_id = %job_id)));

        Ok(job_id)
    }

    async fn owned_job(&self, owner: OwnerId, job_id: JobId) -> Result<ScrapeJob> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| CleanseError::NotFound(format!("job {}", job_id)))?;
        if job.owner_id != owner {
            return Err(CleanseError::Forbidden);
        }
        Ok(job)
    }

    /// Live log of an owned job.
    pub async fn stream(
        &self,
        owner: OwnerId,
        job_id: JobId,
    ) -> Result<impl Stream<Item = StreamItem> + Send + 'static> {
        self.owned_job(owner, job_id).await?;
        Ok(self.broadcaster.subscribe(job_id))
    }

    /// Request a cooperative stop. Acknowledges even when nothing changed.
    pub async fn stop(&self, owner: OwnerId, job_id: JobId) -> Result<bool> {
        let job = self.owned_job(owner, job_id).await?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        Ok(self.stop.request_stop(job_id))
    }

    /// Caller's running jobs, newest first.
    pub async fn list(&self, owner: OwnerId) -> Result<Vec<ScrapeJob>> {
        self.store.list_running(owner).await
    }

    /// Current working copy of an owned job.
    pub async fn download(&self, owner: OwnerId, job_id: JobId) -> Result<Download> {
        let job = self.owned_job(owner, job_id).await?;
        let path = job.working_copy();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CleanseError::NotFound(format!(
                    "working copy for job {}",
                    job_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.csv", job_id));
        Ok(Download { file_name, bytes })
    }
}

/// Accept a bare file name; anything with a directory part is rejected.
fn plain_file_name(name: &str) -> Result<String> {
    let name = name.trim();
    let is_plain = !name.is_empty()
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
        && !name.contains(['/', '\\']);
    if is_plain {
        Ok(name.to_string())
    } else {
        Err(CleanseError::Validation(format!(
            "invalid file name \"{}\"",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::cleanse::events::LockedNote;

    #[test]
    fn test_plain_file_name() {
        assert_eq!(plain_file_name(" leads.csv ").unwrap(), "leads.csv");
        assert!(plain_file_name("").is_err());
        assert!(plain_file_name("../leads.csv").is_err());
        assert!(plain_file_name("a/leads.csv").is_err());
        assert!(plain_file_name("..").is_err());
    }

    #[test]
    fn test_start_request_defaults() {
        let request: StartJobRequest = serde_json::from_value(serde_json::json!({
            "platform": "salesnav",
            "fileName": "leads.csv",
            "identity": { "profileId": "p-1", "token": "li_at=abc" }
        }))
        .unwrap();

        assert_eq!(request.platform, Platform::SalesNav);
        assert!(request.columns.is_none());
        assert_eq!(request.verify, VerifyConfig::default());
        assert_eq!(request.identity.profile_id, "p-1");
    }

    #[test]
    fn test_start_request_splits_comma_keywords() {
        let request: StartJobRequest = serde_json::from_value(serde_json::json!({
            "platform": "linkedin",
            "fileName": "leads.csv",
            "keywordSearchEnabled": true,
            "keywords": ["rust,  hiring", "open   source", " "],
            "identity": { "profileId": "p-1", "token": "t" }
        }))
        .unwrap();

        assert_eq!(request.verify.keywords, vec!["rust", "hiring", "open source"]);
    }

    #[test]
    fn test_start_request_with_keywords() {
        let request: StartJobRequest = serde_json::from_value(serde_json::json!({
            "platform": "linkedin",
            "fileName": "leads.csv",
            "minConnections": 500,
            "keywordSearchEnabled": true,
            "keywords": ["rust", "hiring"],
            "lockedNote": "blank",
            "identity": { "profileId": "p-1", "token": "t" }
        }))
        .unwrap();

        assert_eq!(request.verify.min_connections, 500);
        assert!(request.verify.keyword_search_enabled);
        assert_eq!(request.verify.keywords.len(), 2);
        assert_eq!(request.verify.locked_note, LockedNote::Blank);
    }
}
