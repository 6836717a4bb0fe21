//! Cleanse domain models.

pub mod dataset;
pub mod job;
pub mod store;

pub use dataset::{ColumnMapping, ColumnSelection, Dataset};
pub use job::{JobStatus, Platform, ScrapeJob};
pub use store::{JobStore, MemoryJobStore};
