//! In-process harness: temp upload dir, memory store, scripted browser.

use std::path::PathBuf;
use std::sync::Arc;

use cleanse_core::common::OwnerId;
use cleanse_core::domains::cleanse::{
    working_copy_path, ColumnMapping, ColumnSelection, Dataset, JobContext, JobRegistry,
    JobRunner, JobStore, MemoryJobStore, Platform, RunOutcome, RunnerSettings, ScrapeJob,
    VerifyConfig,
};
use cleanse_core::kernel::testing::MockBrowserProvider;
use cleanse_core::kernel::BrowserIdentity;
use tempfile::TempDir;

pub struct TestHarness {
    pub dir: TempDir,
    pub store: Arc<MemoryJobStore>,
    pub registry: JobRegistry,
    pub provider: MockBrowserProvider,
    pub owner: OwnerId,
}

/// Everything a finished run left behind.
pub struct JobRun {
    pub outcome: RunOutcome,
    pub job: ScrapeJob,
    pub source: Dataset,
    pub working_copy: Dataset,
}

impl JobRun {
    pub fn note(&self, row: usize) -> &str {
        self.working_copy.cell(row, 0)
    }

    pub fn notes(&self) -> Vec<String> {
        (0..self.working_copy.row_count())
            .map(|row| self.note(row).to_string())
            .collect()
    }
}

impl TestHarness {
    pub fn new(provider: MockBrowserProvider) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
            store: Arc::new(MemoryJobStore::new()),
            registry: JobRegistry::new(),
            provider,
            owner: OwnerId::new(),
        }
    }

    /// Write `dataset` as `file_name` in the temp dir and return its path.
    pub async fn write_source(&self, file_name: &str, dataset: &Dataset) -> PathBuf {
        let path = self.dir.path().join(file_name);
        tokio::fs::write(&path, dataset.to_csv_bytes().unwrap())
            .await
            .expect("Failed to write source dataset");
        path
    }

    /// Register a job for `source` and build its runner.
    pub async fn runner(
        &self,
        platform: Platform,
        source: &Dataset,
        verify: VerifyConfig,
        settings: RunnerSettings,
    ) -> (ScrapeJob, JobRunner) {
        self.runner_for("leads.csv", platform, source, verify, settings)
            .await
    }

    /// Like [`TestHarness::runner`], with the source stored as `file_name`.
    pub async fn runner_for(
        &self,
        file_name: &str,
        platform: Platform,
        source: &Dataset,
        verify: VerifyConfig,
        settings: RunnerSettings,
    ) -> (ScrapeJob, JobRunner) {
        let source_path = self.write_source(file_name, source).await;
        let job = ScrapeJob::new(
            self.owner,
            platform,
            source_path.clone(),
            working_copy_path(&source_path),
        );
        self.store.insert(&job).await.unwrap();
        self.registry.register(job.id);

        let mapping =
            ColumnMapping::resolve(source, &ColumnSelection::for_platform(platform)).unwrap();
        let ctx = JobContext::builder()
            .job(job.clone())
            .source(source.clone())
            .mapping(mapping)
            .verify(verify)
            .identity(BrowserIdentity::new("profile-1", "li_at=test"))
            .settings(settings)
            .build();
        let store: Arc<dyn JobStore> = self.store.clone();
        let runner = JobRunner::new(
            ctx,
            Arc::new(self.provider.clone()),
            store,
            self.registry.clone(),
        );
        (job, runner)
    }

    /// Run a job to completion with zero delays.
    pub async fn run(&self, platform: Platform, source: Dataset, verify: VerifyConfig) -> JobRun {
        let (job, runner) = self
            .runner(platform, &source, verify, RunnerSettings::immediate())
            .await;
        let outcome = runner.run().await;

        let job = self.store.get(job.id).await.unwrap().unwrap();
        let working_copy = Dataset::read_csv(job.working_copy()).await.unwrap();
        JobRun {
            outcome,
            job,
            source,
            working_copy,
        }
    }

    pub fn statuses(&self, job: &ScrapeJob) -> Vec<String> {
        self.registry
            .get(job.id)
            .map(|state| state.events_since(0))
            .unwrap_or_default()
            .into_iter()
            .map(|event| event.status)
            .collect()
    }
}
