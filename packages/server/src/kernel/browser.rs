//! Browser session seam.
//!
//! A job drives exactly one [`BrowserSession`], acquired from a
//! [`BrowserProvider`] and released on every exit path. The remote
//! anti-detection browser is opaque to this crate; anything that can navigate,
//! hand back the rendered HTML and click collapsed sections plugs in here.
//!
//! [`HttpBrowserProvider`] is the built-in provider: plain HTTP fetches with the
//! identity's cookie attached. It does not execute JavaScript.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::common::SecretString;

/// Errors raised by a browser provider or session.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser session: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("page error: {0}")]
    Page(String),

    #[error("browser session already closed")]
    Closed,
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Identity/credential pair the provider launches a session for.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserIdentity {
    pub profile_id: String,
    pub token: SecretString,
}

impl BrowserIdentity {
    pub fn new(profile_id: impl Into<String>, token: impl Into<SecretString>) -> Self {
        Self {
            profile_id: profile_id.into(),
            token: token.into(),
        }
    }
}

/// Point-in-time view of the loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    /// URL after redirects
    pub url: String,
    /// Rendered HTML
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Rule for recognising the label of a collapsed-section toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRule {
    Exact(&'static str),
    Prefix(&'static str),
}

impl LabelRule {
    /// Match against a trimmed, lowercased label.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            LabelRule::Exact(expected) => label == *expected,
            LabelRule::Prefix(prefix) => label.starts_with(prefix),
        }
    }
}

/// One exclusive, stateful browsing context.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to `url`, failing if the page doesn't load within `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;

    /// Current URL and rendered HTML.
    async fn snapshot(&mut self) -> BrowserResult<PageSnapshot>;

    /// Click every button or link whose label matches one of `rules`.
    ///
    /// Returns the number of toggles clicked.
    async fn expand_sections(&mut self, rules: &[LabelRule]) -> BrowserResult<usize>;

    /// Release the session. Further calls fail with [`BrowserError::Closed`].
    async fn close(&mut self) -> BrowserResult<()>;
}

/// Hands out browser sessions for an identity.
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    /// Tear down any stale remote session left behind for `identity`.
    async fn cleanup(&self, identity: &BrowserIdentity) -> BrowserResult<()>;

    /// Launch a fresh session for `identity`.
    async fn launch(&self, identity: &BrowserIdentity) -> BrowserResult<Box<dyn BrowserSession>>;

    /// Provider name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }
}

// =============================================================================
// HTTP-backed provider
// =============================================================================

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Provider that fetches pages over plain HTTP.
///
/// The identity token is sent as the `Cookie` header on every request, so a
/// session cookie exported from a signed-in browser profile can be used.
pub struct HttpBrowserProvider {
    user_agent: String,
}

impl Default for HttpBrowserProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpBrowserProvider {
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl BrowserProvider for HttpBrowserProvider {
    async fn cleanup(&self, identity: &BrowserIdentity) -> BrowserResult<()> {
        // Nothing is kept remotely between requests.
        debug!(profile_id = %identity.profile_id, "no remote session state to clean up");
        Ok(())
    }

    async fn launch(&self, identity: &BrowserIdentity) -> BrowserResult<Box<dyn BrowserSession>> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );
        if !identity.token.expose().is_empty() {
            let mut cookie = reqwest::header::HeaderValue::from_str(identity.token.expose())
                .map_err(|e| BrowserError::Launch(format!("invalid session token: {}", e)))?;
            cookie.set_sensitive(true);
            headers.insert(reqwest::header::COOKIE, cookie);
        }

        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        debug!(profile_id = %identity.profile_id, "http browser session launched");
        Ok(Box::new(HttpSession {
            client,
            current: None,
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "http"
    }
}

struct HttpSession {
    client: reqwest::Client,
    current: Option<PageSnapshot>,
    closed: bool,
}

impl HttpSession {
    fn ensure_open(&self) -> BrowserResult<()> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        let navigation_error = |reason: String| BrowserError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrowserError::Timeout(timeout)
                } else {
                    navigation_error(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "navigation returned non-success status");
            return Err(navigation_error(format!("HTTP {}", status)));
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        self.current = Some(PageSnapshot::new(final_url, html));
        Ok(())
    }

    async fn snapshot(&mut self) -> BrowserResult<PageSnapshot> {
        self.ensure_open()?;
        self.current
            .clone()
            .ok_or_else(|| BrowserError::Page("no page loaded".into()))
    }

    async fn expand_sections(&mut self, _rules: &[LabelRule]) -> BrowserResult<usize> {
        self.ensure_open()?;
        // Server-rendered HTML already carries the collapsed text.
        Ok(0)
    }

    async fn close(&mut self) -> BrowserResult<()> {
        self.ensure_open()?;
        self.closed = true;
        self.current = None;
        Ok(())
    }
}
