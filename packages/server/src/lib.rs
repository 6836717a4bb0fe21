// Profile Cleanse - core library
//
// Verifies spreadsheet rows against live profile pages through a remote
// browser session. Each job runs as its own task; progress is streamed to
// clients over SSE and results land in a working copy of the dataset.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
