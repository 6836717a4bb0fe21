//! Live log streaming for one observer.
//!
//! A subscription replays the job's buffered log from the start, then polls
//! the registry on a fixed interval and forwards new entries in order. Every
//! tick yields a heartbeat. Once the job store reports a terminal status the
//! stream yields one [`TerminalEvent`] and ends. Dropping the stream stops
//! the polling.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::events::LogEvent;
use super::models::{JobStatus, JobStore, ScrapeJob};
use super::registry::JobRegistry;
use crate::common::JobId;

/// Final message of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalEvent {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl TerminalEvent {
    fn from_job(job: &ScrapeJob) -> Self {
        let file_path = Some(job.working_copy_path.display().to_string());
        let base = Self {
            status: String::new(),
            message: String::new(),
            done: None,
            stopped: None,
            error: None,
            file_path,
        };
        match job.status {
            JobStatus::Done => Self {
                status: "Completed".into(),
                message: "Job completed".into(),
                done: Some(true),
                ..base
            },
            JobStatus::Stopped => Self {
                status: "Stopped".into(),
                message: "Job stopped".into(),
                stopped: Some(true),
                ..base
            },
            JobStatus::Error | JobStatus::Running => Self {
                status: "Error".into(),
                message: job.error.clone().unwrap_or_else(|| "Job failed".into()),
                error: Some(true),
                ..base
            },
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: "Error".into(),
            message: message.into(),
            done: None,
            stopped: None,
            error: Some(true),
            file_path: None,
        }
    }
}

/// One item of a job stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Event(LogEvent),
    /// Emitted on every poll tick to keep the transport alive
    Heartbeat,
    Terminal(TerminalEvent),
}

#[derive(Clone)]
pub struct EventBroadcaster {
    registry: JobRegistry,
    store: Arc<dyn JobStore>,
    poll_interval: Duration,
}

impl EventBroadcaster {
    pub fn new(registry: JobRegistry, store: Arc<dyn JobStore>, poll_interval: Duration) -> Self {
        Self {
            registry,
            store,
            poll_interval,
        }
    }

    /// Stream `job_id`'s log from index 0 until the job leaves `Running`.
    pub fn subscribe(&self, job_id: JobId) -> impl Stream<Item = StreamItem> + Send + 'static {
        let registry = self.registry.clone();
        let store = self.store.clone();
        let poll_interval = self.poll_interval.max(Duration::from_millis(1));

        async_stream::stream! {
            let mut cursor = 0;
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(job_id = %job_id, "observer connected");

            loop {
                if let Some(state) = registry.get(job_id) {
                    for event in state.events_since(cursor) {
                        cursor += 1;
                        yield StreamItem::Event(event);
                    }
                }

                let job = match store.get(job_id).await {
                    Ok(Some(job)) => job,
                    Ok(None) => {
                        yield StreamItem::Terminal(TerminalEvent::failure("Job not found"));
                        break;
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "job lookup failed while streaming");
                        yield StreamItem::Terminal(TerminalEvent::failure(e.to_string()));
                        break;
                    }
                };

                if job.status.is_terminal() {
                    // The runner logs its last entry before it writes the status.
                    if let Some(state) = registry.get(job_id) {
                        for event in state.events_since(cursor) {
                            cursor += 1;
                            yield StreamItem::Event(event);
                        }
                    }
                    yield StreamItem::Terminal(TerminalEvent::from_job(&job));
                    break;
                }

                ticker.tick().await;
                yield StreamItem::Heartbeat;
            }

            debug!(job_id = %job_id, forwarded = cursor, "stream closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::OwnerId;
    use crate::domains::cleanse::models::{MemoryJobStore, Platform};
    use futures::StreamExt;

    async fn setup() -> (JobRegistry, Arc<MemoryJobStore>, ScrapeJob) {
        let registry = JobRegistry::new();
        let store = Arc::new(MemoryJobStore::new());
        let job = ScrapeJob::new(
            OwnerId::new(),
            Platform::LinkedIn,
            "/tmp/leads.csv",
            "/tmp/leads_cleanse.csv",
        );
        store.insert(&job).await.unwrap();
        registry.register(job.id);
        (registry, store, job)
    }

    #[tokio::test]
    async fn test_replays_then_terminates() {
        let (registry, store, job) = setup().await;
        registry.append_log(job.id, LogEvent::new("Started", "Job created"));
        registry.append_log(job.id, LogEvent::for_row("Match", 2, "Row 2: good"));
        registry.append_log(job.id, LogEvent::new("Completed", "All rows processed"));
        store.finish(job.id, JobStatus::Done, None).await.unwrap();

        let broadcaster = EventBroadcaster::new(registry, store, Duration::from_millis(5));
        let items: Vec<StreamItem> = broadcaster.subscribe(job.id).collect().await;

        assert_eq!(items.len(), 4);
        assert!(matches!(&items[0], StreamItem::Event(e) if e.status == "Started"));
        assert!(matches!(&items[2], StreamItem::Event(e) if e.status == "Completed"));
        match &items[3] {
            StreamItem::Terminal(terminal) => {
                assert_eq!(terminal.done, Some(true));
                assert_eq!(terminal.file_path.as_deref(), Some("/tmp/leads_cleanse.csv"));
            }
            other => panic!("expected terminal event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forwards_new_events_with_heartbeats() {
        let (registry, store, job) = setup().await;
        registry.append_log(job.id, LogEvent::new("Started", "Job created"));

        let broadcaster =
            EventBroadcaster::new(registry.clone(), store.clone(), Duration::from_millis(5));
        let mut stream = Box::pin(broadcaster.subscribe(job.id));

        assert!(matches!(stream.next().await, Some(StreamItem::Event(_))));
        assert_eq!(stream.next().await, Some(StreamItem::Heartbeat));

        registry.append_log(job.id, LogEvent::for_row("Mismatch", 2, "Row 2: bad"));
        registry.append_log(job.id, LogEvent::new("Stopped", "Stopped before row 3"));
        store.finish(job.id, JobStatus::Stopped, None).await.unwrap();

        let rest: Vec<StreamItem> = stream
            .filter(|item| futures::future::ready(*item != StreamItem::Heartbeat))
            .collect()
            .await;

        let statuses: Vec<String> = rest
            .iter()
            .filter_map(|item| match item {
                StreamItem::Event(e) => Some(e.status.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec!["Mismatch", "Stopped"]);
        assert!(matches!(
            rest.last(),
            Some(StreamItem::Terminal(t)) if t.stopped == Some(true)
        ));
    }

    #[tokio::test]
    async fn test_unknown_job_ends_with_error() {
        let broadcaster = EventBroadcaster::new(
            JobRegistry::new(),
            Arc::new(MemoryJobStore::new()),
            Duration::from_millis(5),
        );
        let items: Vec<StreamItem> = broadcaster.subscribe(JobId::new()).collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], StreamItem::Terminal(t) if t.error == Some(true)));
    }

    #[test]
    fn test_terminal_wire_shape() {
        let mut job = ScrapeJob::new(OwnerId::new(), Platform::SalesNav, "/d/a.csv", "/d/a_cleanse.csv");
        job.finish(JobStatus::Error, Some("subscription expired".into()))
            .unwrap();

        let json = serde_json::to_value(TerminalEvent::from_job(&job)).unwrap();
        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "subscription expired");
        assert_eq!(json["filePath"], "/d/a_cleanse.csv");
        assert!(json.get("done").is_none());
    }
}
