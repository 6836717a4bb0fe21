//! Terminal page-state detection.
//!
//! After navigation the page settles into exactly one of three classes: a
//! login challenge, a subscription gate, or a normal profile. The first two
//! halt the whole job.

use std::time::Duration;

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tokio::time::Instant;

use super::{element_text, ExtractorSet};
use crate::common::SessionHalt;
use crate::kernel::browser::{BrowserError, BrowserResult, BrowserSession, PageSnapshot};

lazy_static! {
    static ref LOGIN_SUBMIT: Selector =
        Selector::parse(r#"button[data-litms-control-urn="login-submit"]"#).unwrap();
    static ref REACTIVATE_CTA: Selector =
        Selector::parse("button.premium-chooser__cta").unwrap();
}

/// Where a navigation ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    AuthRequired,
    SessionExpired,
    Profile(PageSnapshot),
}

fn login_required(url: &str, page: &Html) -> bool {
    if url.contains("/login") || url.contains("/checkpoint") {
        return true;
    }

    page.select(&LOGIN_SUBMIT).any(|button| {
        let is_submit = button
            .value()
            .attr("type")
            .map_or(true, |t| t.eq_ignore_ascii_case("submit"));
        let label = element_text(button).to_lowercase();
        let aria = button
            .value()
            .attr("aria-label")
            .map(|a| a.trim().to_lowercase());
        is_submit && (label == "sign in" || aria.as_deref() == Some("sign in"))
    })
}

fn subscription_expired(url: &str, page: &Html) -> bool {
    if url.contains("/premium") || url.contains("/checkout") {
        return true;
    }

    page.select(&REACTIVATE_CTA)
        .any(|button| element_text(button).to_lowercase().contains("reactivate"))
}

/// Session-halting condition shown by the page, if any.
pub fn classify_halt(url: &str, page: &Html) -> Option<SessionHalt> {
    if login_required(url, page) {
        Some(SessionHalt::AuthRequired)
    } else if subscription_expired(url, page) {
        Some(SessionHalt::SessionExpired)
    } else {
        None
    }
}

enum Verdict {
    Halt(SessionHalt),
    Ready,
    Pending,
}

/// Poll the loaded page until it is a halt page or a ready profile.
///
/// Fails with [`BrowserError::Timeout`] if neither shows up within `timeout`.
pub async fn wait_for_page_state(
    session: &mut dyn BrowserSession,
    extractors: &dyn ExtractorSet,
    timeout: Duration,
    poll_interval: Duration,
) -> BrowserResult<PageState> {
    let deadline = Instant::now() + timeout;

    loop {
        let snapshot = session.snapshot().await?;
        let verdict = {
            let page = Html::parse_document(&snapshot.html);
            match classify_halt(&snapshot.url, &page) {
                Some(halt) => Verdict::Halt(halt),
                None if extractors.is_ready(&page) => Verdict::Ready,
                None => Verdict::Pending,
            }
        };

        match verdict {
            Verdict::Halt(SessionHalt::AuthRequired) => return Ok(PageState::AuthRequired),
            Verdict::Halt(SessionHalt::SessionExpired) => return Ok(PageState::SessionExpired),
            Verdict::Ready => return Ok(PageState::Profile(snapshot)),
            Verdict::Pending => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(BrowserError::Timeout(timeout));
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
