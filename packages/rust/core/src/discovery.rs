//! Discovery stage: places search → new company records.
//!
//! Runs one query per (industry, location) pair, follows result pages, and
//! inserts every business not already known by name or website. Existing
//! companies are never touched here.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use bizscout_discovery::{PlacesApi, normalize_website};
use bizscout_shared::{Company, Record, Result, SearchTarget};
use bizscout_storage::{IdentityMatch, Storage};

use crate::pipeline::ProgressReporter;

/// Settings for the discovery stage.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Wait before requesting the page behind a fresh token.
    pub page_delay: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_secs(2),
        }
    }
}

/// Counters for one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub searches: usize,
    /// Searches cut short by an upstream error.
    pub searches_failed: usize,
    pub places_seen: usize,
    pub details_failed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Duplicates whose name and website matched different records.
    pub ambiguous: usize,
    pub unnamed: usize,
    pub invalid: usize,
    pub store_errors: usize,
}

/// A business as reported by the places API, before identity checks.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    name: Option<String>,
    address: Option<String>,
    phone_number: Option<String>,
    website: Option<String>,
}

/// Run discovery for every target, in order.
#[instrument(skip_all, fields(targets = targets.len()))]
pub async fn run_discovery<P: PlacesApi>(
    places: &P,
    storage: &Storage,
    targets: &[SearchTarget],
    opts: &DiscoveryOptions,
    progress: &dyn ProgressReporter,
) -> DiscoveryStats {
    let mut stats = DiscoveryStats::default();

    for (i, target) in targets.iter().enumerate() {
        let query = target.query();
        progress.item(&query, i + 1, targets.len());
        info!(%query, "running places search");
        stats.searches += 1;

        let candidates = collect_candidates(places, &query, opts, &mut stats).await;
        for candidate in candidates {
            save_candidate(storage, target, &query, candidate, &mut stats).await;
        }
    }

    info!(
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        searches_failed = stats.searches_failed,
        "discovery finished"
    );
    stats
}

/// Page through one query and fetch details for every result.
///
/// An upstream error ends pagination for this query only; results gathered
/// before it are kept.
async fn collect_candidates<P: PlacesApi>(
    places: &P,
    query: &str,
    opts: &DiscoveryOptions,
    stats: &mut DiscoveryStats,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = match places.search(query, page_token.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                warn!(%query, error = %e, "places search failed, skipping remaining pages");
                stats.searches_failed += 1;
                break;
            }
        };

        for place in page.results {
            stats.places_seen += 1;
            let details = match places.details(&place.place_id).await {
                Ok(details) => details,
                Err(e) => {
                    warn!(place_id = %place.place_id, error = %e, "place details failed, skipping");
                    stats.details_failed += 1;
                    continue;
                }
            };

            candidates.push(Candidate {
                name: place.name.or(details.name),
                address: place.formatted_address.or(details.formatted_address),
                phone_number: details.formatted_phone_number,
                website: details.website.as_deref().map(normalize_website),
            });
        }

        match page.next_page_token {
            Some(token) => {
                // The token only becomes valid upstream after a short delay.
                tokio::time::sleep(opts.page_delay).await;
                page_token = Some(token);
            }
            None => break,
        }
    }

    candidates
}

/// Insert a candidate unless it is unnamed, already known, or invalid.
async fn save_candidate(
    storage: &Storage,
    target: &SearchTarget,
    query: &str,
    candidate: Candidate,
    stats: &mut DiscoveryStats,
) {
    let Some(name) = candidate
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    else {
        warn!(?candidate, "skipping place without a company name");
        stats.unnamed += 1;
        return;
    };

    match is_known(storage, name, candidate.website.as_deref()).await {
        Ok(true) => {
            debug!(company = name, "skipping duplicate company");
            stats.duplicates += 1;
            return;
        }
        Ok(false) => {}
        Err(e) => {
            warn!(company = name, error = %e, "identity lookup failed, skipping");
            stats.store_errors += 1;
            return;
        }
    }

    let mut company = Company::new(name, query);
    company.address = candidate.address;
    company.phone_number = candidate.phone_number;
    company.website = candidate.website;
    company.industry = Some(target.industry.clone());

    if let Err(e) = company.validate() {
        warn!(company = name, error = %e, "validation failed, not inserting");
        stats.invalid += 1;
        return;
    }

    match storage.insert_company(&company).await {
        Ok(()) => {
            info!(company = name, website = company.website.as_deref().unwrap_or(""), "added new company");
            stats.inserted += 1;
        }
        Err(e) => {
            warn!(company = name, error = %e, "insert failed");
            stats.store_errors += 1;
        }
    }
}

async fn is_known(storage: &Storage, name: &str, website: Option<&str>) -> Result<bool> {
    let identity = storage.find_company_by_identity(name, website).await?;
    if let IdentityMatch::Ambiguous { by_website, by_name } = &identity {
        warn!(
            company = name,
            website = website.unwrap_or(""),
            website_match = %by_website.id,
            name_match = %by_name.id,
            "name and website match different companies"
        );
    }
    Ok(identity.existing().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::testing::{FakePlaces, seed_company, test_storage};

    const QUERY: &str = "roofing in Oakville Ontario";

    fn opts() -> DiscoveryOptions {
        DiscoveryOptions {
            page_delay: Duration::ZERO,
        }
    }

    fn oakville() -> Vec<SearchTarget> {
        vec![SearchTarget::new("roofing", "Oakville Ontario")]
    }

    #[tokio::test]
    async fn stores_stripped_website_and_unhunted_flag() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing"))], None)
            .place("p1", Some("https://acme.ca/?utm=1"));

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.inserted, 1);

        let stored = storage.find_company_by_name("Acme Roofing").await.unwrap().unwrap();
        assert_eq!(stored.website.as_deref(), Some("https://acme.ca/"));
        assert!(!stored.has_been_hunted);
        assert_eq!(stored.search_term_used, QUERY);
        assert_eq!(stored.industry.as_deref(), Some("roofing"));
        assert_eq!(stored.phone_number.as_deref(), Some("(905) 555-0100"));
        assert_eq!(stored.address.as_deref(), Some("p1 Main St"));
    }

    #[tokio::test]
    async fn rerun_inserts_nothing() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing")), ("p2", Some("Best Roofing"))], None)
            .place("p1", Some("https://acme.ca/"))
            .place("p2", Some("https://best.ca/"));

        let first = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(first.inserted, 2);

        let second = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(storage.count_companies().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn follows_pagination_tokens() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing"))], Some("tok-2"))
            .page(QUERY, Some("tok-2"), &[("p2", Some("Best Roofing"))], None)
            .place("p1", Some("https://acme.ca/"))
            .place("p2", Some("https://best.ca/"));

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.inserted, 2);
        assert_eq!(
            *places.calls.lock().unwrap(),
            vec![(QUERY.to_string(), None), (QUERY.to_string(), Some("tok-2".to_string()))]
        );
    }

    #[tokio::test]
    async fn same_website_under_another_name_is_duplicate() {
        let storage = test_storage().await;
        seed_company(&storage, "Acme Roofing Inc", Some("https://acme.ca/")).await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing"))], None)
            .place("p1", Some("https://acme.ca/?gclid=xyz"));

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.duplicates, 1);
    }

    #[tokio::test]
    async fn conflicting_identity_is_flagged_and_skipped() {
        let storage = test_storage().await;
        seed_company(&storage, "Acme Roofing", Some("https://acme.ca/")).await;
        seed_company(&storage, "Best Roofing", Some("https://best.ca/")).await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing"))], None)
            .place("p1", Some("https://best.ca/"));

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.duplicates, 1);
        assert_eq!(storage.count_companies().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn companies_without_websites_do_not_collide() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing")), ("p2", Some("Best Roofing"))], None)
            .place("p1", None)
            .place("p2", None);

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.inserted, 2);
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("   ")), ("p2", None)], None)
            .place("p1", Some("https://blank.ca/"))
            .place("p2", Some("https://none.ca/"));

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.unnamed, 2);
        assert_eq!(stats.inserted, 0);
        assert_eq!(storage.count_companies().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_search_does_not_stop_later_targets() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page("roofing in Markham Ontario", None, &[("p1", Some("Acme Roofing"))], None)
            .place("p1", Some("https://acme.ca/"));
        let targets = vec![
            SearchTarget::new("roofing", "Oakville Ontario"),
            SearchTarget::new("roofing", "Markham Ontario"),
        ];

        let stats = run_discovery(&places, &storage, &targets, &opts(), &SilentProgress).await;
        assert_eq!(stats.searches, 2);
        assert_eq!(stats.searches_failed, 1);
        assert_eq!(stats.inserted, 1);
    }

    #[tokio::test]
    async fn failed_second_page_keeps_first_page() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing"))], Some("stale"))
            .place("p1", Some("https://acme.ca/"));

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.searches_failed, 1);
        assert_eq!(stats.inserted, 1);
    }

    #[tokio::test]
    async fn details_failure_skips_only_that_place() {
        let storage = test_storage().await;
        let places = FakePlaces::default()
            .page(QUERY, None, &[("p1", Some("Acme Roofing")), ("p2", Some("Best Roofing"))], None)
            .place("p2", Some("https://best.ca/"));

        let stats = run_discovery(&places, &storage, &oakville(), &opts(), &SilentProgress).await;
        assert_eq!(stats.details_failed, 1);
        assert_eq!(stats.inserted, 1);
        assert!(storage.find_company_by_name("Best Roofing").await.unwrap().is_some());
    }
}
