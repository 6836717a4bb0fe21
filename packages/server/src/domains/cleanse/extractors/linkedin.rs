//! Public LinkedIn profile pages.

use lazy_static::lazy_static;
use scraper::{Html, Selector};

use super::{element_text, first_text, parse_count, ExtractorSet};
use crate::domains::cleanse::models::Platform;

lazy_static! {
    static ref FULL_NAME: Selector = Selector::parse("h1.text-heading-xlarge").unwrap();
    static ref JOB_TITLE: Selector =
        Selector::parse(r#"div.hoverable-link-text.t-bold > span[aria-hidden="true"]"#).unwrap();
    static ref COMPANY: Selector = Selector::parse(
        r#"section[data-view-name="profile-card"] ul li.artdeco-list__item a[data-field="experience_company_logo"] span.t-14.t-normal > span[aria-hidden="true"]"#
    )
    .unwrap();
    static ref LIST: Selector = Selector::parse("ul").unwrap();
    static ref ITEM: Selector = Selector::parse("li").unwrap();
}

/// Separator between company and employment type ("Acme · Full-time").
const COMPANY_SEPARATOR: &str = " · ";

/// LinkedIn profiles never report a locked state.
pub struct LinkedInExtractors;

impl ExtractorSet for LinkedInExtractors {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn ready_selector(&self) -> Option<&'static Selector> {
        None
    }

    fn extract_full_name(&self, page: &Html) -> String {
        first_text(page, &FULL_NAME)
    }

    fn extract_job_title(&self, page: &Html) -> String {
        first_text(page, &JOB_TITLE)
    }

    fn extract_company(&self, page: &Html) -> String {
        let text = first_text(page, &COMPANY);
        text.split(COMPANY_SEPARATOR)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn extract_connection_count(&self, page: &Html) -> u32 {
        page.select(&LIST)
            .find_map(|list| {
                list.select(&ITEM)
                    .map(|item| element_text(item).to_lowercase())
                    .find(|text| text.contains("connections"))
            })
            .map(|text| parse_count(&text))
            .unwrap_or(0)
    }
}
