//! Keyword search over the page's visible text.

use scraper::{ElementRef, Html};

use crate::kernel::browser::LabelRule;

/// Toggles that reveal collapsed profile sections.
pub const EXPAND_LABELS: &[LabelRule] = &[
    LabelRule::Exact("see more"),
    LabelRule::Exact("more"),
    LabelRule::Prefix("see more about"),
    LabelRule::Prefix("see more experience"),
    LabelRule::Prefix("see more education"),
    LabelRule::Prefix("show more"),
];

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child) = ElementRef::wrap(child) {
            if !HIDDEN_ELEMENTS.contains(&child.value().name()) {
                collect_text(child, out);
            }
        }
    }
}

/// Lowercased visible text of the page.
pub fn visible_text(page: &Html) -> String {
    let mut out = String::new();
    collect_text(page.root_element(), &mut out);
    collapse_whitespace(&out).to_lowercase()
}

/// Collapse whitespace runs to single spaces, the same way [`visible_text`]
/// does for the page.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a configured keyword list.
///
/// Commas separate keywords in the Note cell, so an entry holding commas is
/// split into several keywords. Blank entries are dropped.
pub fn normalize_keywords<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|entry| {
            entry
                .as_ref()
                .split(',')
                .map(collapse_whitespace)
                .collect::<Vec<_>>()
        })
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// Configured keywords found in `text` as case-insensitive substrings.
///
/// Keeps configuration order, skips blanks and duplicates. Whitespace inside
/// keywords and text is compared collapsed.
pub fn match_keywords(text: &str, keywords: &[String]) -> Vec<String> {
    let haystack = collapse_whitespace(text).to_lowercase();
    let mut seen = Vec::new();
    let mut matched = Vec::new();

    for keyword in normalize_keywords(keywords) {
        let needle = keyword.to_lowercase();
        if seen.contains(&needle) {
            continue;
        }
        if haystack.contains(&needle) {
            matched.push(keyword);
        }
        seen.push(needle);
    }

    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_skips_scripts() {
        let page = Html::parse_document(
            r#"<html><head><title>Profile</title></head><body>
               <p>Building   Rust services</p>
               <script>var hiring = true;</script>
               <style>.x { color: red }</style>
               </body></html>"#,
        );
        let text = visible_text(&page);

        assert!(text.contains("building rust services"));
        assert!(!text.contains("hiring"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_match_keywords_is_case_insensitive() {
        let keywords = vec!["Rust".to_string(), "golang".to_string(), " Hiring ".to_string()];
        let matched = match_keywords("we are hiring rust engineers", &keywords);
        assert_eq!(matched, vec!["Rust".to_string(), "Hiring".to_string()]);
    }

    #[test]
    fn test_match_keywords_skips_blank_and_duplicates() {
        let keywords = vec!["".to_string(), "rust".to_string(), "RUST".to_string()];
        assert_eq!(match_keywords("rust", &keywords), vec!["rust".to_string()]);
    }

    #[test]
    fn test_keywords_match_across_collapsed_whitespace() {
        let page = Html::parse_document("<p>Senior\n   platform engineer</p>");
        let keywords = vec!["platform  engineer".to_string(), "senior\tplatform".to_string()];

        let matched = match_keywords(&visible_text(&page), &keywords);

        assert_eq!(matched, vec!["platform engineer", "senior platform"]);
    }

    #[test]
    fn test_normalize_keywords_splits_commas() {
        let keywords = normalize_keywords(["rust, go", " ,", "machine   learning"]);
        assert_eq!(keywords, vec!["rust", "go", "machine learning"]);
    }

    #[test]
    fn test_expand_labels() {
        let matches = |label: &str| EXPAND_LABELS.iter().any(|rule| rule.matches(label));
        assert!(matches("see more"));
        assert!(matches("show more skills"));
        assert!(matches("see more about jane"));
        assert!(!matches("see less"));
    }
}
