//! Scripted browser for tests.
//!
//! [`MockBrowserProvider`] serves canned HTML keyed by URL and records every
//! call so tests can assert on launches, navigations and releases.
//!
//! ```rust,ignore
//! let provider = MockBrowserProvider::new()
//!     .with_page("https://site.test/in/jane", "<h1>Jane</h1>")
//!     .failing_launches(1);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::browser::{
    BrowserError, BrowserIdentity, BrowserProvider, BrowserResult, BrowserSession, LabelRule,
    PageSnapshot,
};

/// Hook invoked on every navigation with the running navigation count and URL.
pub type NavigateHook = Arc<dyn Fn(usize, &str) + Send + Sync>;

#[derive(Debug, Clone)]
struct MockPage {
    final_url: String,
    html: String,
    expanded_html: Option<String>,
    error: Option<String>,
}

#[derive(Default)]
struct MockState {
    pages: HashMap<String, MockPage>,
    launch_failures: u32,
    launches: u32,
    cleanups: u32,
    navigations: Vec<String>,
    closes: u32,
    expansions: u32,
}

/// Browser provider with scripted pages and call recording.
#[derive(Clone, Default)]
pub struct MockBrowserProvider {
    state: Arc<Mutex<MockState>>,
    on_navigate: Arc<Mutex<Option<NavigateHook>>>,
}

impl MockBrowserProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, url: &str, page: MockPage) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), page);
    }

    /// Serve `html` for `url`.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.insert(
            url,
            MockPage {
                final_url: url.to_string(),
                html: html.to_string(),
                expanded_html: None,
                error: None,
            },
        );
        self
    }

    /// Serve `html` for `url` as if the browser was redirected to `final_url`.
    pub fn with_redirect(self, url: &str, final_url: &str, html: &str) -> Self {
        self.insert(
            url,
            MockPage {
                final_url: final_url.to_string(),
                html: html.to_string(),
                expanded_html: None,
                error: None,
            },
        );
        self
    }

    /// Serve `html`, switching to `expanded_html` once sections are expanded.
    pub fn with_expandable_page(self, url: &str, html: &str, expanded_html: &str) -> Self {
        self.insert(
            url,
            MockPage {
                final_url: url.to_string(),
                html: html.to_string(),
                expanded_html: Some(expanded_html.to_string()),
                error: None,
            },
        );
        self
    }

    /// Fail navigation to `url`.
    pub fn with_failing_page(self, url: &str, reason: &str) -> Self {
        self.insert(
            url,
            MockPage {
                final_url: url.to_string(),
                html: String::new(),
                expanded_html: None,
                error: Some(reason.to_string()),
            },
        );
        self
    }

    /// Fail the first `count` launches.
    pub fn failing_launches(self, count: u32) -> Self {
        self.state.lock().unwrap().launch_failures = count;
        self
    }

    /// Run `hook` on every navigation.
    pub fn on_navigate(self, hook: impl Fn(usize, &str) + Send + Sync + 'static) -> Self {
        *self.on_navigate.lock().unwrap() = Some(Arc::new(hook));
        self
    }

    pub fn launch_count(&self) -> u32 {
        self.state.lock().unwrap().launches
    }

    pub fn cleanup_count(&self) -> u32 {
        self.state.lock().unwrap().cleanups
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().unwrap().closes
    }

    pub fn expansion_count(&self) -> u32 {
        self.state.lock().unwrap().expansions
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }
}

#[async_trait]
impl BrowserProvider for MockBrowserProvider {
    async fn cleanup(&self, _identity: &BrowserIdentity) -> BrowserResult<()> {
        self.state.lock().unwrap().cleanups += 1;
        Ok(())
    }

    async fn launch(&self, _identity: &BrowserIdentity) -> BrowserResult<Box<dyn BrowserSession>> {
        let mut state = self.state.lock().unwrap();
        state.launches += 1;
        if state.launch_failures > 0 {
            state.launch_failures -= 1;
            return Err(BrowserError::Launch("profile failed to start".into()));
        }

        Ok(Box::new(MockSession {
            provider: self.clone(),
            current: None,
            expanded: false,
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockSession {
    provider: MockBrowserProvider,
    current: Option<MockPage>,
    expanded: bool,
    closed: bool,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        if self.closed {
            return Err(BrowserError::Closed);
        }

        let (count, page) = {
            let mut state = self.provider.state.lock().unwrap();
            state.navigations.push(url.to_string());
            (state.navigations.len(), state.pages.get(url).cloned())
        };
        let hook = self.provider.on_navigate.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(count, url);
        }

        self.expanded = false;
        match page {
            Some(MockPage {
                error: Some(reason),
                ..
            }) => {
                self.current = None;
                Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason,
                })
            }
            Some(page) => {
                self.current = Some(page);
                Ok(())
            }
            None => {
                self.current = None;
                Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: "no page scripted".into(),
                })
            }
        }
    }

    async fn snapshot(&mut self) -> BrowserResult<PageSnapshot> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        let page = self
            .current
            .as_ref()
            .ok_or_else(|| BrowserError::Page("no page loaded".into()))?;
        let html = match (&page.expanded_html, self.expanded) {
            (Some(expanded), true) => expanded.clone(),
            _ => page.html.clone(),
        };
        Ok(PageSnapshot::new(page.final_url.clone(), html))
    }

    async fn expand_sections(&mut self, _rules: &[LabelRule]) -> BrowserResult<usize> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        self.provider.state.lock().unwrap().expansions += 1;
        match &self.current {
            Some(page) if page.expanded_html.is_some() => {
                self.expanded = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        self.closed = true;
        self.provider.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
