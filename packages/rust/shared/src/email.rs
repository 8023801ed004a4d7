//! Canonical email syntax rules shared by the validator and the scrapers.

use std::sync::LazyLock;

use regex::Regex;

/// Anchored pattern every persisted email address must satisfy.
pub const EMAIL_PATTERN: &str = r"^[\w.%+-]+@[\w.-]+\.[A-Za-z]{2,}$";

pub(crate) static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"));

/// Check an address against [`EMAIL_PATTERN`].
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Normalize a raw candidate scraped from a page or link target.
///
/// Drops a `mailto:` scheme, cuts everything from the first character that
/// cannot appear in an address (query strings, brackets, whitespace), and
/// lower-cases the rest. The result still has to pass [`is_valid_email`].
pub fn clean_email(raw: &str) -> String {
    let raw = raw.trim();
    let raw = match raw.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => &raw[7..],
        _ => raw,
    };

    raw.chars()
        .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '@'))
        .collect::<String>()
        .to_lowercase()
}

/// Domain part of an address (after the last `@`), lower-cased.
pub fn email_domain(email: &str) -> Option<String> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_lowercase())
        .filter(|d| !d.is_empty())
}
