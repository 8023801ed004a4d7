//! Contact-email extraction from a fetched HTML page.

use std::collections::HashSet;
use std::sync::LazyLock;

use bizscout_shared::{clean_email, is_valid_email};
use regex::Regex;
use scraper::{Html, Selector};

/// Unanchored address pattern for scanning free text.
static TEXT_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("text email pattern")
});

/// Extract candidate contact emails from a page.
///
/// `mailto:` link targets come first in document order, then addresses found
/// in the rendered text. Every candidate is cleaned and lower-cased, invalid
/// ones are dropped, and duplicates keep their first position, so the first
/// entry is stable for a given page.
pub fn extract_emails(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);

    let mut candidates = mailto_targets(&doc);

    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    candidates.extend(TEXT_EMAIL_RE.find_iter(&text).map(|m| clean_email(m.as_str())));

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|email| is_valid_email(email))
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

/// Cleaned targets of every `mailto:` link.
fn mailto_targets(doc: &Html) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").unwrap();

    doc.select(&link_sel)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| {
            href.get(..7)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        })
        .map(clean_email)
        .collect()
}
