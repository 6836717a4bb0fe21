//! Profile cleanse domain.
//!
//! Verifies each row of an uploaded dataset against the live profile page it
//! links to and records a verdict in a leading `Note` column of a working
//! copy. Jobs run independently; the registry and broadcaster let clients
//! watch and stop them.

pub mod broadcaster;
pub mod checkpoint;
pub mod events;
pub mod extractors;
pub mod models;
pub mod registry;
pub mod runner;
pub mod service;
pub mod stop;

pub use broadcaster::{EventBroadcaster, StreamItem, TerminalEvent};
pub use checkpoint::{working_copy_path, Checkpointer, NOTE_HEADER};
pub use events::{LockedNote, LogEvent, MatchDetail, RowResult};
pub use models::{
    ColumnMapping, ColumnSelection, Dataset, JobStatus, JobStore, MemoryJobStore, Platform,
    ScrapeJob,
};
pub use registry::{JobRegistry, RuntimeState};
pub use runner::{JobContext, JobRunner, RunOutcome, RunnerSettings, VerifyConfig};
pub use service::{CleanseService, Download, StartJobRequest};
pub use stop::StopController;
