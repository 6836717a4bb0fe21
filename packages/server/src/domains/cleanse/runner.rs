//! Row-by-row verification of one job.
//!
//! [`JobRunner::run`] owns everything a job touches while it runs: the
//! working copy, the browser session and the job's registry entry. Rows are
//! processed strictly in order, one at a time. Failures are classified:
//!
//! - a row failure records `error` and the loop moves on
//! - a session halt (login or subscription page) ends the job
//! - a provider failure ends the job before the first row
//!
//! Every exit path writes a final checkpoint, closes the browser exactly once
//! and sets the job's terminal status exactly once.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use scraper::Html;
use serde::{Deserialize, Deserializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;
use url::Url;

use super::checkpoint::Checkpointer;
use super::events::{
    ExpectedFields, FieldMatches, LockedNote, LogEvent, MatchDetail, RowResult,
};
use super::extractors::{
    extractors_for, match_keywords, normalize_keywords, visible_text, wait_for_page_state,
    ExtractorSet, PageState, EXPAND_LABELS,
};
use super::models::{ColumnMapping, Dataset, JobStatus, JobStore, ScrapeJob};
use super::registry::{JobRegistry, RuntimeState};
use crate::common::{CleanseError, JobId, SessionHalt};
use crate::kernel::{
    retry_with_backoff, BrowserIdentity, BrowserProvider, BrowserResult,
    BrowserSession, RetryPolicy,
};

/// Spreadsheet row number of data row 0 (row 1 is the header).
const FIRST_DATA_ROW: usize = 2;

/// Timing and retry knobs shared by every job in the process.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub provider_retry: RetryPolicy,
    pub navigation_timeout: Duration,
    pub ready_timeout: Duration,
    pub ready_poll_interval: Duration,
    pub row_delay_min: Duration,
    pub row_delay_max: Duration,
    pub checkpoint_every: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            provider_retry: RetryPolicy::fixed(2, Duration::from_secs(5)),
            navigation_timeout: Duration::from_secs(60),
            ready_timeout: Duration::from_secs(15),
            ready_poll_interval: Duration::from_millis(250),
            row_delay_min: Duration::from_millis(1000),
            row_delay_max: Duration::from_millis(2000),
            checkpoint_every: 10,
        }
    }
}

impl RunnerSettings {
    /// No sleeps anywhere; for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            provider_retry: RetryPolicy::fixed(2, Duration::ZERO),
            navigation_timeout: Duration::from_secs(5),
            ready_timeout: Duration::from_millis(50),
            ready_poll_interval: Duration::from_millis(5),
            row_delay_min: Duration::ZERO,
            row_delay_max: Duration::ZERO,
            checkpoint_every: 10,
        }
    }

    /// Uniform random delay within the configured bounds.
    fn row_delay(&self) -> Duration {
        if self.row_delay_max <= self.row_delay_min {
            return self.row_delay_min;
        }
        let span = (self.row_delay_max - self.row_delay_min).as_millis() as u64;
        self.row_delay_min + Duration::from_millis(fastrand::u64(0..=span))
    }
}

/// Per-job verification options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyConfig {
    /// Connection count a profile must reach
    pub min_connections: u32,
    pub keyword_search_enabled: bool,
    #[serde(deserialize_with = "deserialize_keywords")]
    pub keywords: Vec<String>,
    pub locked_note: LockedNote,
}

fn deserialize_keywords<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer).map(normalize_keywords)
}

impl VerifyConfig {
    fn keyword_search_active(&self) -> bool {
        self.keyword_search_enabled && self.keywords.iter().any(|k| !k.trim().is_empty())
    }
}

/// Everything one run needs, resolved before the job starts.
#[derive(TypedBuilder)]
pub struct JobContext {
    pub job: ScrapeJob,
    /// Parsed source dataset; the runner builds its working copy from this
    pub source: Dataset,
    pub mapping: ColumnMapping,
    #[builder(default)]
    pub verify: VerifyConfig,
    pub identity: BrowserIdentity,
    #[builder(default)]
    pub settings: RunnerSettings,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Stop observed before spreadsheet row `row`
    Stopped { row: usize },
    Halted(SessionHalt),
    Failed(String),
}

impl RunOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            RunOutcome::Completed => JobStatus::Done,
            RunOutcome::Stopped { .. } => JobStatus::Stopped,
            RunOutcome::Halted(_) | RunOutcome::Failed(_) => JobStatus::Error,
        }
    }
}

/// Result of verifying one row.
enum RowOutcome {
    Recorded {
        result: RowResult,
        event: LogEvent,
        navigated: bool,
    },
    Halted(SessionHalt),
}

pub struct JobRunner {
    ctx: JobContext,
    provider: Arc<dyn BrowserProvider>,
    store: Arc<dyn JobStore>,
    registry: JobRegistry,
    extractors: &'static dyn ExtractorSet,
}

impl JobRunner {
    pub fn new(
        ctx: JobContext,
        provider: Arc<dyn BrowserProvider>,
        store: Arc<dyn JobStore>,
        registry: JobRegistry,
    ) -> Self {
        let extractors = extractors_for(ctx.job.platform);
        Self {
            ctx,
            provider,
            store,
            registry,
            extractors,
        }
    }

    fn job_id(&self) -> JobId {
        self.ctx.job.id
    }

    fn log(&self, event: LogEvent) {
        self.registry.append_log(self.job_id(), event);
    }

    /// Run the job to a terminal status.
    pub async fn run(mut self) -> RunOutcome {
        let job_id = self.job_id();
        let state = self
            .registry
            .get(job_id)
            .unwrap_or_else(|| self.registry.register(job_id));

        let source = std::mem::take(&mut self.ctx.source);
        let outcome = self.execute(source, &state).await;
        self.finish(&outcome).await;
        outcome
    }

    async fn execute(&self, source: Dataset, state: &RuntimeState) -> RunOutcome {
        let settings = &self.ctx.settings;
        let job = &self.ctx.job;

        let mut checkpointer = match Checkpointer::create(
            source,
            &job.source_path,
            &job.working_copy_path,
            settings.checkpoint_every,
        )
        .await
        {
            Ok(checkpointer) => checkpointer,
            Err(e) => return RunOutcome::Failed(e.to_string()),
        };

        self.log(LogEvent::new(
            "Launching Browser",
            format!("Starting {} browser session", self.provider.name()),
        ));
        let mut session = match self.acquire_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "browser session could not be acquired");
                return RunOutcome::Failed(CleanseError::Provider(e).to_string());
            }
        };

        self.log(LogEvent::new(
            "Scraping",
            format!("Processing {} rows", checkpointer.row_count()),
        ));
        let looped = AssertUnwindSafe(self.process_rows(
            session.as_mut(),
            &mut checkpointer,
            state,
        ))
        .catch_unwind()
        .await;

        if let Err(e) = session.close().await {
            warn!(job_id = %job.id, error = %e, "failed to close browser session");
        }

        let outcome = match looped {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(job_id = %job.id, "row loop panicked");
                RunOutcome::Failed("unexpected failure while processing rows".into())
            }
        };

        match checkpointer.checkpoint().await {
            Ok(()) => outcome,
            Err(e) => match outcome {
                RunOutcome::Completed | RunOutcome::Stopped { .. } => {
                    RunOutcome::Failed(e.to_string())
                }
                other => {
                    error!(job_id = %job.id, error = %e, "final checkpoint failed");
                    other
                }
            },
        }
    }

    /// Launch a session, cleaning up stale remote state before each attempt.
    async fn acquire_session(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        let provider = &self.provider;
        let identity = &self.ctx.identity;
        retry_with_backoff(
            &self.ctx.settings.provider_retry,
            "launch browser session",
            |attempt| async move {
                if let Err(e) = provider.cleanup(identity).await {
                    warn!(attempt, error = %e, "stale session cleanup failed");
                }
                provider.launch(identity).await
            },
        )
        .await
    }

    async fn process_rows(
        &self,
        session: &mut dyn BrowserSession,
        checkpointer: &mut Checkpointer,
        state: &RuntimeState,
    ) -> RunOutcome {
        let total = checkpointer.row_count();
        let stop = state.stop_token();

        for index in 0..total {
            let row = index + FIRST_DATA_ROW;
            if state.is_stop_requested() {
                return RunOutcome::Stopped { row };
            }

            let outcome = match profile_url(checkpointer.cell(index, self.ctx.mapping.url)) {
                Some(url) => {
                    let expected = self.expected_fields(checkpointer, index);
                    self.verify_row(session, row, &url, expected).await
                }
                None => RowOutcome::Recorded {
                    result: RowResult::Error,
                    event: LogEvent::for_row(
                        "Invalid URL",
                        row,
                        format!("Row {}: invalid or missing URL", row),
                    ),
                    navigated: false,
                },
            };

            match outcome {
                RowOutcome::Halted(halt) => return RunOutcome::Halted(halt),
                RowOutcome::Recorded {
                    result,
                    event,
                    navigated,
                } => {
                    self.log(event);
                    if let Err(e) = checkpointer.record(index, &result).await {
                        return RunOutcome::Failed(e.to_string());
                    }
                    if navigated && index + 1 < total {
                        self.pause(&stop).await;
                    }
                }
            }
        }

        RunOutcome::Completed
    }

    fn expected_fields(&self, checkpointer: &Checkpointer, index: usize) -> ExpectedFields {
        let mapping = &self.ctx.mapping;
        ExpectedFields::from_cells(
            checkpointer.cell(index, mapping.full_name),
            checkpointer.cell(index, mapping.job_title),
            checkpointer.cell(index, mapping.company),
            self.ctx.verify.min_connections,
        )
    }

    async fn verify_row(
        &self,
        session: &mut dyn BrowserSession,
        row: usize,
        url: &str,
        expected: ExpectedFields,
    ) -> RowOutcome {
        match self.inspect_profile(session, row, url, expected).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let e = CleanseError::Row {
                    row,
                    reason: e.to_string(),
                };
                warn!(job_id = %self.job_id(), error = %e, "row failed");
                RowOutcome::Recorded {
                    result: RowResult::Error,
                    event: LogEvent::for_row("Error", row, e.to_string()),
                    navigated: true,
                }
            }
        }
    }

    async fn inspect_profile(
        &self,
        session: &mut dyn BrowserSession,
        row: usize,
        url: &str,
        expected: ExpectedFields,
    ) -> BrowserResult<RowOutcome> {
        let settings = &self.ctx.settings;
        session.goto(url, settings.navigation_timeout).await?;

        let snapshot = match wait_for_page_state(
            session,
            self.extractors,
            settings.ready_timeout,
            settings.ready_poll_interval,
        )
        .await?
        {
            PageState::AuthRequired => return Ok(RowOutcome::Halted(SessionHalt::AuthRequired)),
            PageState::SessionExpired => {
                return Ok(RowOutcome::Halted(SessionHalt::SessionExpired))
            }
            PageState::Profile(snapshot) => snapshot,
        };

        let found = {
            let page = Html::parse_document(&snapshot.html);
            if self.extractors.is_locked_profile(&page) {
                None
            } else {
                Some(self.extractors.extract_profile(&page))
            }
        };
        let Some(found) = found else {
            return Ok(RowOutcome::Recorded {
                result: self.ctx.verify.locked_note.row_result(),
                event: LogEvent::for_row("Locked", row, format!("Row {}: profile is locked", row)),
                navigated: true,
            });
        };

        let matches = FieldMatches::compare(&expected, &found);
        let mut result = if matches.all() {
            RowResult::Good
        } else {
            RowResult::Bad
        };

        let mut keywords = Vec::new();
        if matches.all() && self.ctx.verify.keyword_search_active() {
            match self.search_keywords(session).await {
                Ok(found) => keywords = found,
                Err(e) => warn!(row, error = %e, "keyword search failed, keeping verdict"),
            }
            if !keywords.is_empty() {
                result = RowResult::Keywords(keywords.clone());
            }
        }

        let status = if matches.all() { "Match" } else { "Mismatch" };
        let event = LogEvent::for_row(status, row, format!("Row {}: {}", row, result))
            .with_matches(MatchDetail {
                platform: self.ctx.job.platform,
                matches,
                expected,
                found,
                keywords,
            });

        Ok(RowOutcome::Recorded {
            result,
            event,
            navigated: true,
        })
    }

    /// Expand collapsed sections, then look for keywords in the visible text.
    async fn search_keywords(&self, session: &mut dyn BrowserSession) -> BrowserResult<Vec<String>> {
        let expanded = session.expand_sections(EXPAND_LABELS).await?;
        debug!(expanded, "expanded collapsed sections");

        let snapshot = session.snapshot().await?;
        let text = visible_text(&Html::parse_document(&snapshot.html));
        Ok(match_keywords(&text, &self.ctx.verify.keywords))
    }

    /// Jittered sleep between rows; a stop request cuts it short.
    async fn pause(&self, stop: &CancellationToken) {
        let delay = self.ctx.settings.row_delay();
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.cancelled() => {}
        }
    }

    /// Close the registry entry to stop requests, append the terminal log
    /// entry, then write the terminal status.
    async fn finish(&self, outcome: &RunOutcome) {
        let file_path = self.ctx.job.working_copy_path.display().to_string();
        let (event, error) = match outcome {
            RunOutcome::Completed => (LogEvent::new("Completed", "All rows processed"), None),
            RunOutcome::Stopped { row } => (
                LogEvent::new("Stopped", format!("Stopped before row {}", row)).with_row(*row),
                None,
            ),
            RunOutcome::Halted(halt) => (
                LogEvent::new(halt.status(), halt.to_string()),
                Some(CleanseError::Session(*halt).to_string()),
            ),
            RunOutcome::Failed(message) => (
                LogEvent::new("Error", message.clone()),
                Some(message.clone()),
            ),
        };
        self.registry.mark_finished(self.job_id());
        self.log(event.with_file_path(file_path));

        match self.store.finish(self.job_id(), outcome.status(), error).await {
            Ok(job) => info!(job_id = %job.id, status = ?job.status, "job finished"),
            Err(e) => error!(job_id = %self.job_id(), error = %e, "failed to record terminal status"),
        }
    }
}

/// Absolute http(s) URL in a cell, if it holds one.
fn profile_url(cell: &str) -> Option<String> {
    let url = Url::parse(cell.trim()).ok()?;
    let web = matches!(url.scheme(), "http" | "https");
    (web && url.host_str().is_some()).then(|| url.to_string())
}
