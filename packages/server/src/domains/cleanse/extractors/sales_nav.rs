//! Sales Navigator lead pages.

use lazy_static::lazy_static;
use scraper::{Html, Selector};

use super::{element_text, first_text, parse_count, ExtractorSet};
use crate::domains::cleanse::models::Platform;

lazy_static! {
    static ref PERSON_NAME: Selector =
        Selector::parse(r#"h1[data-anonymize="person-name"]"#).unwrap();
    static ref JOB_TITLE: Selector =
        Selector::parse(r#"span[data-anonymize="job-title"]"#).unwrap();
    static ref COMPANY: Selector = Selector::parse(
        r#"[data-sn-view-name="lead-current-role"] a[data-anonymize="company-name"]"#
    )
    .unwrap();
    static ref HEADER_SECTION: Selector = Selector::parse("section._header_sqh8tm").unwrap();
    static ref DIV: Selector = Selector::parse("div").unwrap();
    static ref BUTTON: Selector = Selector::parse("button").unwrap();
}

/// Name shown in place of the real one on out-of-network leads.
const ANONYMIZED_NAME: &str = "LinkedIn Member";

pub struct SalesNavExtractors;

impl ExtractorSet for SalesNavExtractors {
    fn platform(&self) -> Platform {
        Platform::SalesNav
    }

    fn ready_selector(&self) -> Option<&'static Selector> {
        Some(&*PERSON_NAME)
    }

    fn extract_full_name(&self, page: &Html) -> String {
        first_text(page, &PERSON_NAME)
    }

    fn extract_job_title(&self, page: &Html) -> String {
        first_text(page, &JOB_TITLE)
    }

    fn extract_company(&self, page: &Html) -> String {
        first_text(page, &COMPANY)
    }

    /// Innermost header `div` mentioning "connections".
    fn extract_connection_count(&self, page: &Html) -> u32 {
        let Some(header) = page.select(&HEADER_SECTION).next() else {
            return 0;
        };

        let mentions = |text: String| text.to_lowercase().contains("connections");
        header
            .select(&DIV)
            .filter(|div| mentions(element_text(*div)))
            .find(|div| !div.select(&DIV).any(|child| mentions(element_text(child))))
            .map(|div| parse_count(&element_text(div).to_lowercase()))
            .unwrap_or(0)
    }

    fn is_locked_profile(&self, page: &Html) -> bool {
        let anonymized = page
            .select(&PERSON_NAME)
            .next()
            .is_some_and(|h1| element_text(h1) == ANONYMIZED_NAME);
        let unlock_offered = page
            .select(&BUTTON)
            .any(|button| element_text(button).to_lowercase() == "unlock full profile");

        anonymized || unlock_offered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAD: &str = r#"
        <html><body>
          <section class="_header_sqh8tm">
            <h1 data-anonymize="person-name">  Jane Doe </h1>
            <div class="meta">
              <div>Greater Boston</div>
              <div><span>500+</span> connections</div>
            </div>
          </section>
          <section data-sn-view-name="lead-current-role">
            <span data-anonymize="job-title">Chief Technology Officer</span>
            <a data-anonymize="company-name" href="/company/1">Acme Corp</a>
          </section>
        </body></html>
    "#;

    #[test]
    fn test_extracts_lead_fields() {
        let page = Html::parse_document(LEAD);
        let fields = SalesNavExtractors.extract_profile(&page);

        assert_eq!(fields.full_name, "jane doe");
        assert_eq!(fields.job_title, "chief technology officer");
        assert_eq!(fields.company, "acme corp");
        assert_eq!(fields.connection_count, 500);
        assert!(SalesNavExtractors.is_ready(&page));
        assert!(!SalesNavExtractors.is_locked_profile(&page));
    }

    #[test]
    fn test_missing_elements_yield_empty_values() {
        let page = Html::parse_document("<html><body><p>Loading…</p></body></html>");
        let fields = SalesNavExtractors.extract_profile(&page);

        assert_eq!(fields.full_name, "");
        assert_eq!(fields.company, "");
        assert_eq!(fields.connection_count, 0);
        assert!(!SalesNavExtractors.is_ready(&page));
    }

    #[test]
    fn test_anonymized_name_is_locked() {
        let page = Html::parse_document(
            r#"<h1 data-anonymize="person-name">LinkedIn Member</h1>"#,
        );
        assert!(SalesNavExtractors.is_locked_profile(&page));
    }

    #[test]
    fn test_unlock_button_is_locked() {
        let page = Html::parse_document(
            r#"<h1 data-anonymize="person-name">Jane Doe</h1>
               <button> Unlock full profile </button>"#,
        );
        assert!(SalesNavExtractors.is_locked_profile(&page));
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let first = SalesNavExtractors.extract_profile(&Html::parse_document(LEAD));
        let second = SalesNavExtractors.extract_profile(&Html::parse_document(LEAD));
        assert_eq!(first, second);
    }
}
