//! Process-local runtime state for running jobs.
//!
//! One [`RuntimeState`] per job: the stop flag and the append-only log. The
//! map is shared by the job's runner, any number of stream observers and the
//! stop endpoint. This is a cache for live observation; the job store stays
//! the source of truth for status.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::events::LogEvent;
use crate::common::JobId;

pub const STOP_REQUESTED: &str = "Stop Requested";

/// Live state of one job.
pub struct RuntimeState {
    job_id: JobId,
    /// Cancelled once a stop is requested; the only stop flag
    stop_token: CancellationToken,
    finished_at: Mutex<Option<Instant>>,
    log: RwLock<Vec<LogEvent>>,
}

impl RuntimeState {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            stop_token: CancellationToken::new(),
            finished_at: Mutex::new(None),
            log: RwLock::new(Vec::new()),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_token.is_cancelled()
    }

    /// Lets waits end early when a stop arrives.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop_token.clone()
    }

    fn finished(&self) -> MutexGuard<'_, Option<Instant>> {
        match self.finished_at.lock() {
            Ok(finished) => finished,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished().is_some()
    }

    fn finished_before(&self, cutoff: Instant) -> bool {
        self.finished().is_some_and(|at| at <= cutoff)
    }

    fn mark_finished(&self) {
        self.finished().get_or_insert_with(Instant::now);
    }

    /// Cancel the stop token and log `event`, unless the job already finished
    /// or was already stopping. Returns `true` only for the call that cancelled.
    ///
    /// Runs under the finish lock, so the stop entry can never land after the
    /// entry that ends the job.
    fn request_stop(&self, event: LogEvent) -> bool {
        let finished = self.finished();
        if finished.is_some() || self.stop_token.is_cancelled() {
            return false;
        }
        self.stop_token.cancel();
        self.append(event);
        true
    }

    /// Append `event`, returning its index in the log.
    pub fn append(&self, event: LogEvent) -> usize {
        let mut log = match self.log.write() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.push(event);
        log.len() - 1
    }

    /// Events at index `cursor` and later, in emission order.
    pub fn events_since(&self, cursor: usize) -> Vec<LogEvent> {
        let log = match self.log.read() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.get(cursor..).map(<[LogEvent]>::to_vec).unwrap_or_default()
    }

    pub fn log_len(&self) -> usize {
        match self.log.read() {
            Ok(log) => log.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Concurrent map from job id to [`RuntimeState`].
///
/// Also tracks which files running jobs read and write, so no two jobs ever
/// write the same working copy.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobId, Arc<RuntimeState>>>,
    claims: Arc<DashMap<PathBuf, JobId>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state for `job_id`: empty log, stop unset.
    pub fn register(&self, job_id: JobId) -> Arc<RuntimeState> {
        let state = Arc::new(RuntimeState::new(job_id));
        self.jobs.insert(job_id, state.clone());
        debug!(job_id = %job_id, "job registered");
        state
    }

    pub fn get(&self, job_id: JobId) -> Option<Arc<RuntimeState>> {
        self.jobs.get(&job_id).map(|entry| entry.value().clone())
    }

    /// Append to the job's log and mirror it to tracing. No-op for unknown jobs.
    pub fn append_log(&self, job_id: JobId, event: LogEvent) -> bool {
        let Some(state) = self.get(job_id) else {
            return false;
        };
        info!(
            job_id = %job_id,
            status = %event.status,
            row = ?event.row,
            "{}",
            event.message
        );
        state.append(event);
        true
    }

    /// Request a cooperative stop.
    ///
    /// Idempotent. Unknown or finished jobs are left alone. The first
    /// successful request appends a `Stop Requested` log entry.
    pub fn request_stop(&self, job_id: JobId) -> bool {
        let Some(state) = self.get(job_id) else {
            return false;
        };
        let event = LogEvent::new(STOP_REQUESTED, "Stop requested; finishing the current row");
        state.request_stop(event)
    }

    /// Close the job to stop requests and release its file claims.
    pub fn mark_finished(&self, job_id: JobId) {
        if let Some(state) = self.get(job_id) {
            state.mark_finished();
        }
        self.release_paths(job_id);
    }

    /// Reserve `paths` for `job_id`.
    ///
    /// All or nothing: if any path is held by another job, nothing is claimed
    /// and that path is returned.
    pub fn claim_paths(&self, job_id: JobId, paths: &[&Path]) -> Result<(), PathBuf> {
        let mut claimed = Vec::with_capacity(paths.len());
        for path in paths {
            match self.claims.entry(path.to_path_buf()) {
                Entry::Occupied(entry) if *entry.get() != job_id => {
                    let taken = entry.key().clone();
                    drop(entry);
                    for path in claimed {
                        self.claims.remove(&path);
                    }
                    return Err(taken);
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(entry) => {
                    claimed.push(entry.key().clone());
                    entry.insert(job_id);
                }
            }
        }
        Ok(())
    }

    /// Whether a running job reads or writes `path`.
    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claims.contains_key(path)
    }

    pub fn release_paths(&self, job_id: JobId) {
        self.claims.retain(|_, owner| *owner != job_id);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop entries of jobs that finished at least `retain` ago.
    pub fn cleanup(&self, retain: Duration) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(retain) else {
            return 0;
        };
        let before = self.jobs.len();
        self.jobs.retain(|_, state| !state.finished_before(cutoff));
        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            debug!(removed, "finished jobs evicted from registry");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_starts_empty() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        let state = registry.register(id);

        assert_eq!(state.log_len(), 0);
        assert!(!state.is_stop_requested());
        assert!(!state.is_finished());
        assert!(registry.get(id).is_some());
    }

    #[test]
    fn test_events_since_cursor() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        registry.register(id);

        for i in 0..3 {
            registry.append_log(id, LogEvent::new("Scraping", format!("event {}", i)));
        }
        let state = registry.get(id).unwrap();

        assert_eq!(state.events_since(0).len(), 3);
        assert_eq!(state.events_since(2)[0].message, "event 2");
        assert!(state.events_since(3).is_empty());
        assert!(state.events_since(10).is_empty());
    }

    #[test]
    fn test_request_stop_is_idempotent() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        let state = registry.register(id);

        assert!(registry.request_stop(id));
        assert!(!registry.request_stop(id));

        assert!(state.is_stop_requested());
        assert!(state.stop_token().is_cancelled());
        let stops = state
            .events_since(0)
            .into_iter()
            .filter(|e| e.status == STOP_REQUESTED)
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_request_stop_ignores_unknown_and_finished_jobs() {
        let registry = JobRegistry::new();
        assert!(!registry.request_stop(JobId::new()));

        let id = JobId::new();
        let state = registry.register(id);
        registry.mark_finished(id);

        assert!(!registry.request_stop(id));
        assert!(!state.is_stop_requested());
        assert_eq!(state.log_len(), 0);
    }

    #[test]
    fn test_stop_entry_never_follows_finish() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        let state = registry.register(id);

        registry.mark_finished(id);
        registry.append_log(id, LogEvent::new("Completed", "All rows processed"));
        assert!(!registry.request_stop(id));

        let statuses: Vec<_> = state.events_since(0).into_iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec!["Completed"]);
    }

    #[test]
    fn test_claims_are_exclusive_until_finish() {
        let registry = JobRegistry::new();
        let first = JobId::new();
        let second = JobId::new();
        let source = Path::new("/data/leads.csv");
        let copy = Path::new("/data/leads_cleanse.csv");
        let other = Path::new("/data/other.csv");

        assert!(registry.claim_paths(first, &[source, copy]).is_ok());
        assert_eq!(
            registry.claim_paths(second, &[other, copy]),
            Err(copy.to_path_buf())
        );
        // the partial claim was rolled back
        assert!(!registry.is_claimed(other));

        registry.register(first);
        registry.mark_finished(first);
        assert!(!registry.is_claimed(copy));
        assert!(registry.claim_paths(second, &[other, copy]).is_ok());
    }

    #[test]
    fn test_cleanup_only_evicts_finished_jobs() {
        let registry = JobRegistry::new();
        let running = JobId::new();
        let finished = JobId::new();
        registry.register(running);
        registry.register(finished);
        registry.mark_finished(finished);

        assert_eq!(registry.cleanup(Duration::ZERO), 1);
        assert!(registry.get(running).is_some());
        assert!(registry.get(finished).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_event() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        registry.register(id);

        let mut handles = Vec::new();
        for task in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    registry.append_log(id, LogEvent::new("Scraping", format!("{}-{}", task, i)));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.get(id).unwrap().log_len(), 400);
    }
}
