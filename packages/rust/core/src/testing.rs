//! In-memory fakes of the external collaborators for stage tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use bizscout_crawler::PageFetcher;
use bizscout_discovery::{PlaceDetails, PlaceSummary, PlacesApi, SearchPage};
use bizscout_intel::{DomainIntelApi, DomainReport, EmailEntry, EmailKind};
use bizscout_shared::{BizScoutError, Company, Result};
use bizscout_storage::Storage;
use uuid::Uuid;

/// Fresh on-disk store under the temp dir.
pub(crate) async fn test_storage() -> Storage {
    let tmp = std::env::temp_dir().join(format!("bizscout_core_{}.db", Uuid::now_v7()));
    Storage::open(&tmp).await.expect("open test db")
}

/// Insert a company with the given name and website.
pub(crate) async fn seed_company(storage: &Storage, name: &str, website: Option<&str>) -> Company {
    let mut company = Company::new(name, "roofing in Oakville Ontario");
    company.website = website.map(String::from);
    storage.insert_company(&company).await.expect("seed company");
    company
}

fn upstream(what: &str) -> BizScoutError {
    BizScoutError::Network(format!("fake upstream failure: {what}"))
}

// ---------------------------------------------------------------------------
// Places
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakePlaces {
    /// Pages keyed by (query, page token).
    pages: HashMap<(String, Option<String>), SearchPage>,
    details: HashMap<String, PlaceDetails>,
    pub calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakePlaces {
    pub fn page(
        mut self,
        query: &str,
        token: Option<&str>,
        places: &[(&str, Option<&str>)],
        next: Option<&str>,
    ) -> Self {
        let results = places
            .iter()
            .map(|(id, name)| PlaceSummary {
                place_id: (*id).into(),
                name: name.map(String::from),
                formatted_address: Some(format!("{id} Main St")),
            })
            .collect();
        self.pages.insert(
            (query.into(), token.map(String::from)),
            SearchPage {
                results,
                next_page_token: next.map(String::from),
            },
        );
        self
    }

    pub fn place(mut self, place_id: &str, website: Option<&str>) -> Self {
        self.details.insert(
            place_id.into(),
            PlaceDetails {
                formatted_phone_number: Some("(905) 555-0100".into()),
                website: website.map(String::from),
                ..PlaceDetails::default()
            },
        );
        self
    }
}

impl PlacesApi for FakePlaces {
    async fn search(&self, query: &str, page_token: Option<&str>) -> Result<SearchPage> {
        let key = (query.to_string(), page_token.map(String::from));
        self.calls.lock().unwrap().push(key.clone());
        self.pages.get(&key).cloned().ok_or_else(|| upstream(query))
    }

    async fn details(&self, place_id: &str) -> Result<PlaceDetails> {
        self.details.get(place_id).cloned().ok_or_else(|| upstream(place_id))
    }
}

// ---------------------------------------------------------------------------
// Website fetcher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeFetcher {
    pages: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn site(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

impl PageFetcher for FakeFetcher {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| BizScoutError::Timeout {
            url: url.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Domain intelligence
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeIntel {
    reports: HashMap<String, DomainReport>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeIntel {
    pub fn report(mut self, domain: &str, report: DomainReport) -> Self {
        self.reports.insert(domain.into(), report);
        self
    }
}

impl DomainIntelApi for FakeIntel {
    async fn lookup(&self, domain: &str) -> Result<DomainReport> {
        self.calls.lock().unwrap().push(domain.to_string());
        self.reports.get(domain).cloned().ok_or_else(|| BizScoutError::Http {
            url: format!("https://api.example/v2/domain-search?domain={domain}"),
            status: 429,
        })
    }
}

/// A provider entry with only the fields the stage reads.
pub(crate) fn entry(value: &str, kind: EmailKind, first_name: Option<&str>) -> EmailEntry {
    EmailEntry {
        value: value.into(),
        kind,
        first_name: first_name.map(String::from),
        last_name: None,
        position: None,
        linkedin: None,
    }
}
