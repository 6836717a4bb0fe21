//! Platform-specific field extraction.
//!
//! Each platform is a unit struct implementing [`ExtractorSet`]; the table in
//! [`extractors_for`] resolves one per job from its [`Platform`]. Extractors
//! read a parsed snapshot of the page and never fail: a missing element yields
//! an empty string or a zero count, which simply fails the comparison.

mod keywords;
mod linkedin;
mod page_state;
mod sales_nav;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub use keywords::{match_keywords, normalize_keywords, visible_text, EXPAND_LABELS};
pub use linkedin::LinkedInExtractors;
pub use page_state::{classify_halt, wait_for_page_state, PageState};
pub use sales_nav::SalesNavExtractors;

use super::events::ProfileFields;
use super::models::Platform;

/// Capability set every platform variant exposes.
pub trait ExtractorSet: Send + Sync {
    fn platform(&self) -> Platform;

    /// Element whose presence means extraction may begin. `None` means the
    /// page is usable as soon as navigation returns.
    fn ready_selector(&self) -> Option<&'static Selector>;

    fn extract_full_name(&self, page: &Html) -> String;

    fn extract_job_title(&self, page: &Html) -> String;

    fn extract_company(&self, page: &Html) -> String;

    fn extract_connection_count(&self, page: &Html) -> u32;

    /// Restricted-view page where identity fields are withheld.
    fn is_locked_profile(&self, _page: &Html) -> bool {
        false
    }

    fn is_ready(&self, page: &Html) -> bool {
        self.ready_selector()
            .map_or(true, |selector| page.select(selector).next().is_some())
    }

    /// All four fields from one snapshot.
    fn extract_profile(&self, page: &Html) -> ProfileFields {
        ProfileFields {
            full_name: self.extract_full_name(page),
            job_title: self.extract_job_title(page),
            company: self.extract_company(page),
            connection_count: self.extract_connection_count(page),
        }
    }
}

static SALES_NAV: SalesNavExtractors = SalesNavExtractors;
static LINKEDIN: LinkedInExtractors = LinkedInExtractors;

/// Extractor set for `platform`.
pub fn extractors_for(platform: Platform) -> &'static dyn ExtractorSet {
    match platform {
        Platform::SalesNav => &SALES_NAV,
        Platform::LinkedIn => &LINKEDIN,
    }
}

lazy_static! {
    static ref COUNT: Regex = Regex::new(r"\d[\d,+]*").unwrap();
}

/// Element text with whitespace collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased text of the first match, or `""`.
pub(crate) fn first_text(page: &Html, selector: &Selector) -> String {
    page.select(selector)
        .next()
        .map(|el| element_text(el).to_lowercase())
        .unwrap_or_default()
}

/// First number in text such as "500+ connections" or "1,204 connections".
pub(crate) fn parse_count(text: &str) -> u32 {
    COUNT
        .find(text)
        .map(|m| m.as_str().replace([',', '+'], ""))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}
