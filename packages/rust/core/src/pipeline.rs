//! End-to-end run: discovery → website enrichment → domain enrichment.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument};

use bizscout_crawler::PageFetcher;
use bizscout_discovery::PlacesApi;
use bizscout_intel::DomainIntelApi;
use bizscout_shared::{AppConfig, SearchTarget};
use bizscout_storage::Storage;

use crate::discovery::{DiscoveryOptions, DiscoveryStats, run_discovery};
use crate::enrichment::{DomainStats, run_domain_enrichment};
use crate::website::{WebsiteOptions, WebsiteStats, run_website_enrichment};

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// (industry, location) pairs, searched in order.
    pub searches: Vec<SearchTarget>,
    pub discovery: DiscoveryOptions,
    pub website: WebsiteOptions,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            searches: config.searches.clone(),
            discovery: DiscoveryOptions {
                page_delay: Duration::from_millis(config.discovery.page_delay_ms),
            },
            website: WebsiteOptions {
                timeout: Duration::from_secs(config.crawl.timeout_secs),
            },
        }
    }
}

/// External services the stages call out to.
pub struct Collaborators<P, F, I> {
    pub places: P,
    pub fetcher: F,
    pub intel: I,
}

/// Outcome of a pipeline run.
///
/// A stage whose input listing failed has `None` stats.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub discovery: DiscoveryStats,
    pub website: Option<WebsiteStats>,
    pub domain: Option<DomainStats>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn stage(&self, name: &str);
    /// Called for each unit of work within the current stage.
    fn item(&self, label: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &PipelineReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _name: &str) {}
    fn item(&self, _label: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &PipelineReport) {}
}

/// Run all three stages, in order, against `storage`.
///
/// Per-record problems never abort a stage. A storage failure while listing
/// a stage's input is logged and the next stage still runs.
#[instrument(skip_all, fields(searches = config.searches.len()))]
pub async fn run_pipeline<P, F, I>(
    config: &PipelineConfig,
    collaborators: &Collaborators<P, F, I>,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> PipelineReport
where
    P: PlacesApi,
    F: PageFetcher,
    I: DomainIntelApi,
{
    let started_at = Utc::now();
    info!(%started_at, "starting pipeline");

    // --- Stage 1: Discovery ---
    progress.stage("Discovering companies");
    let discovery = run_discovery(
        &collaborators.places,
        storage,
        &config.searches,
        &config.discovery,
        progress,
    )
    .await;

    // --- Stage 2: Website emails ---
    progress.stage("Scraping company websites");
    let website =
        match run_website_enrichment(&collaborators.fetcher, storage, &config.website, progress)
            .await
        {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!(error = %e, "website enrichment aborted");
                None
            }
        };

    // --- Stage 3: Domain intelligence ---
    progress.stage("Enriching company domains");
    let domain = match run_domain_enrichment(&collaborators.intel, storage, progress).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            error!(error = %e, "domain enrichment aborted");
            None
        }
    };

    let report = PipelineReport {
        started_at,
        finished_at: Utc::now(),
        discovery,
        website,
        domain,
    };

    progress.done(&report);

    info!(
        inserted = report.discovery.inserted,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "pipeline complete"
    );

    report
}
