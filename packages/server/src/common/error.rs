//! Typed errors for the cleanse pipeline.
//!
//! Uses `thiserror` so callers can branch on the failure class: a validation
//! error is reported synchronously, a row error never leaves the row loop, a
//! session halt ends the job but keeps the working copy, a provider error is
//! job-fatal.

use std::fmt;

use thiserror::Error;

use crate::kernel::browser::BrowserError;

/// Session-level condition that halts a whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionHalt {
    /// The site asked the browser to sign in.
    AuthRequired,
    /// The subscription behind the session has lapsed.
    SessionExpired,
}

impl SessionHalt {
    /// Status tag used in the job log.
    pub fn status(&self) -> &'static str {
        match self {
            SessionHalt::AuthRequired => "Login Required",
            SessionHalt::SessionExpired => "Subscription Expired",
        }
    }
}

impl fmt::Display for SessionHalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionHalt::AuthRequired => {
                f.write_str("browser session requires login; sign in and restart the job")
            }
            SessionHalt::SessionExpired => {
                f.write_str("subscription for the browser session has expired")
            }
        }
    }
}

/// Errors raised by the cleanse pipeline and its control surface.
#[derive(Debug, Error)]
pub enum CleanseError {
    /// Bad request input such as unresolvable columns; the job never starts.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A single row failed; recorded as `error` and the job moves on.
    #[error("row {row} failed: {reason}")]
    Row { row: usize, reason: String },

    /// Auth-required or subscription-expired page reached mid-run.
    #[error("session halted: {0}")]
    Session(SessionHalt),

    /// Browser session could not be acquired after bounded retries.
    #[error("browser provider failed: {0}")]
    Provider(#[source] BrowserError),

    /// Persisting the working copy failed.
    #[error("checkpoint failed for {path}: {reason}")]
    Checkpoint { path: String, reason: String },

    /// Job metadata store failed.
    #[error("job store error: {0}")]
    Store(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("forbidden")]
    Forbidden,

    /// The request would touch a file a running job reads or writes.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for cleanse operations.
pub type Result<T> = std::result::Result<T, CleanseError>;
