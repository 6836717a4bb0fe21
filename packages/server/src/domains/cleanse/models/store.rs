//! Job metadata persistence.
//!
//! The durable store is an external collaborator; [`JobStore`] is the seam and
//! [`MemoryJobStore`] backs development and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::job::{JobStatus, ScrapeJob};
use crate::common::{CleanseError, JobId, OwnerId, Result};

/// Durable source of truth for job status.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &ScrapeJob) -> Result<()>;

    async fn get(&self, id: JobId) -> Result<Option<ScrapeJob>>;

    /// Move a running job to its terminal status. Fails if it already left `Running`.
    async fn finish(&self, id: JobId, status: JobStatus, error: Option<String>) -> Result<ScrapeJob>;

    /// Running jobs for `owner`, newest first.
    async fn list_running(&self, owner: OwnerId) -> Result<Vec<ScrapeJob>>;
}

/// In-memory job store.
///
/// Not suitable for production as records are lost on restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, ScrapeJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> CleanseError {
    CleanseError::Store("job store lock poisoned".into())
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &ScrapeJob) -> Result<()> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(CleanseError::Store(format!("duplicate job id {}", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<ScrapeJob>> {
        Ok(self.jobs.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn finish(&self, id: JobId, status: JobStatus, error: Option<String>) -> Result<ScrapeJob> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| CleanseError::NotFound(id.to_string()))?;
        job.finish(status, error)?;
        Ok(job.clone())
    }

    async fn list_running(&self, owner: OwnerId) -> Result<Vec<ScrapeJob>> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut running: Vec<ScrapeJob> = jobs
            .values()
            .filter(|job| job.owner_id == owner && job.status.is_running())
            .cloned()
            .collect();
        running.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::cleanse::models::Platform;

    fn job(owner: OwnerId) -> ScrapeJob {
        ScrapeJob::new(owner, Platform::LinkedIn, "/tmp/a.csv", "/tmp/a_cleanse.csv")
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryJobStore::new();
        let job = job(OwnerId::new());
        store.insert(&job).await.unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert!(store.insert(&job).await.is_err());
    }

    #[tokio::test]
    async fn test_finish_is_exactly_once() {
        let store = MemoryJobStore::new();
        let job = job(OwnerId::new());
        store.insert(&job).await.unwrap();

        let finished = store.finish(job.id, JobStatus::Stopped, None).await.unwrap();
        assert_eq!(finished.status, JobStatus::Stopped);
        assert!(store.finish(job.id, JobStatus::Done, None).await.is_err());
        assert_eq!(
            store.get(job.id).await.unwrap().unwrap().status,
            JobStatus::Stopped
        );
    }

    #[tokio::test]
    async fn test_list_running_filters_owner_and_status() {
        let store = MemoryJobStore::new();
        let owner = OwnerId::new();
        let first = job(owner);
        let second = job(owner);
        let foreign = job(OwnerId::new());
        for j in [&first, &second, &foreign] {
            store.insert(j).await.unwrap();
        }
        store.finish(first.id, JobStatus::Done, None).await.unwrap();

        let running = store.list_running(owner).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, second.id);
    }
}
