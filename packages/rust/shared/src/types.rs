//! Core record types for the companies and people collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::schema::{FieldKind, FieldRule, Pattern, Record, Ruleset};

/// Company name stored on a person whose email domain matches no company.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Website placeholder meaning "no site to scrape".
pub const NO_WEBSITE: &str = "N/A";

/// Host of a stored website, lower-cased, without a leading `www.`.
pub fn website_domain(website: &str) -> Option<String> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }

    let url = Url::parse(website)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("http://{website}")).ok())?;

    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    (!host.is_empty()).then_some(host)
}

// ---------------------------------------------------------------------------
// SearchTarget
// ---------------------------------------------------------------------------

/// One (industry, location) pair driving discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTarget {
    pub industry: String,
    pub location: String,
}

impl SearchTarget {
    pub fn new(industry: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            location: location.into(),
        }
    }

    /// Free-text places query, also recorded as `search_term_used`.
    pub fn query(&self) -> String {
        format!("{} in {}", self.industry, self.location)
    }
}

// ---------------------------------------------------------------------------
// Company
// ---------------------------------------------------------------------------

/// A business discovered through the places API.
///
/// Identity is `company_name` or `website`; `id` is only the storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Storage key (UUID v7, time-sortable).
    pub id: String,
    pub company_name: String,
    pub address: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    /// Primary contact email.
    pub email: Option<String>,
    /// Secondary and generic addresses.
    pub other_emails: Option<Vec<String>>,
    pub linkedin_url: Option<String>,
    pub linkedin_description: Option<String>,
    pub year_founded: Option<String>,
    pub linkedin_employees: Option<String>,
    /// Places query that first surfaced this company.
    pub search_term_used: String,
    pub scrape_timestamp: DateTime<Utc>,
    /// Set once the domain-intelligence stage has processed the company.
    #[serde(default)]
    pub has_been_hunted: bool,
}

impl Company {
    /// A fresh, un-enriched company as created by discovery.
    pub fn new(company_name: impl Into<String>, search_term_used: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            company_name: company_name.into(),
            address: None,
            industry: None,
            website: None,
            phone_number: None,
            email: None,
            other_emails: None,
            linkedin_url: None,
            linkedin_description: None,
            year_founded: None,
            linkedin_employees: None,
            search_term_used: search_term_used.into(),
            scrape_timestamp: Utc::now(),
            has_been_hunted: false,
        }
    }

    /// The website to scrape, if there is a real one.
    pub fn scrapable_website(&self) -> Option<&str> {
        self.website
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty() && *w != NO_WEBSITE)
    }

    /// Domain of the stored website, if it has a real one.
    pub fn domain(&self) -> Option<String> {
        self.scrapable_website().and_then(website_domain)
    }

    /// True if `email` is already listed in `other_emails`.
    pub fn has_other_email(&self, email: &str) -> bool {
        self.other_emails
            .as_deref()
            .is_some_and(|list| list.iter().any(|e| e == email))
    }
}

static COMPANY_RULES: Ruleset = Ruleset {
    collection: "companies",
    fields: &[
        FieldRule::required("id", FieldKind::String).non_blank(),
        FieldRule::required("company_name", FieldKind::String).non_blank(),
        FieldRule::optional("address", FieldKind::String),
        FieldRule::optional("industry", FieldKind::String),
        FieldRule::optional("website", FieldKind::String),
        FieldRule::optional("phone_number", FieldKind::String),
        FieldRule::optional("email", FieldKind::String).pattern(Pattern::Email),
        FieldRule::optional("other_emails", FieldKind::StringList).pattern(Pattern::Email),
        FieldRule::optional("linkedin_url", FieldKind::String),
        FieldRule::optional("linkedin_description", FieldKind::String),
        FieldRule::optional("year_founded", FieldKind::String),
        FieldRule::optional("linkedin_employees", FieldKind::String),
        FieldRule::required("search_term_used", FieldKind::String),
        FieldRule::required("scrape_timestamp", FieldKind::DateTime),
        FieldRule::optional("has_been_hunted", FieldKind::Boolean),
    ],
};

impl Record for Company {
    const COLLECTION: &'static str = "companies";

    fn ruleset() -> &'static Ruleset {
        &COMPANY_RULES
    }
}

// ---------------------------------------------------------------------------
// Person
// ---------------------------------------------------------------------------

/// A named contact at a company, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub email: String,
    pub first_name: String,
    /// Empty when unknown.
    pub last_name: String,
    pub position: Option<String>,
    /// Denormalized at write time; [`UNKNOWN_COMPANY`] if no match.
    pub company_name: String,
    pub linkedin_profile: Option<String>,
    #[serde(default)]
    pub has_been_hunted: bool,
    pub scrape_timestamp: DateTime<Utc>,
}

static PERSON_RULES: Ruleset = Ruleset {
    collection: "people",
    fields: &[
        FieldRule::required("email", FieldKind::String).pattern(Pattern::Email),
        FieldRule::required("first_name", FieldKind::String).non_blank(),
        FieldRule::required("last_name", FieldKind::String),
        FieldRule::optional("position", FieldKind::String),
        FieldRule::required("company_name", FieldKind::String).non_blank(),
        FieldRule::optional("linkedin_profile", FieldKind::String),
        FieldRule::optional("has_been_hunted", FieldKind::Boolean),
        FieldRule::required("scrape_timestamp", FieldKind::DateTime),
    ],
};

impl Record for Person {
    const COLLECTION: &'static str = "people";

    fn ruleset() -> &'static Ruleset {
        &PERSON_RULES
    }
}
