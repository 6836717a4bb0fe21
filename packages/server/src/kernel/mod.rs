//! Kernel module - infrastructure the cleanse domain runs on.
//!
//! - [`browser`] - the browser-session seam and the HTTP-backed provider
//! - [`retry`] - bounded retry with backoff
//! - [`testing`] - scripted mock browser for tests

pub mod browser;
pub mod retry;
pub mod testing;

pub use browser::{
    BrowserError, BrowserIdentity, BrowserProvider, BrowserResult, BrowserSession,
    HttpBrowserProvider, LabelRule, PageSnapshot,
};
pub use retry::{retry_with_backoff, RetryPolicy};
