//! Website enrichment stage: scrape each company's site for contact emails.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use bizscout_crawler::{PageFetcher, extract_emails};
use bizscout_shared::{Company, Record};
use bizscout_storage::Storage;

use crate::pipeline::ProgressReporter;

/// Settings for the website stage.
#[derive(Debug, Clone)]
pub struct WebsiteOptions {
    /// Per-site fetch bound.
    pub timeout: Duration,
}

impl Default for WebsiteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for one website pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteStats {
    pub companies: usize,
    /// Missing website or the `N/A` placeholder.
    pub skipped: usize,
    pub fetch_failed: usize,
    pub no_emails: usize,
    pub updated: usize,
    pub invalid: usize,
    pub store_errors: usize,
}

/// Visit every stored company with a real website and record the emails found.
///
/// The first address becomes `email`, the rest replace `other_emails`. A
/// company whose page fails or yields nothing is left exactly as it was.
#[instrument(skip_all)]
pub async fn run_website_enrichment<F: PageFetcher>(
    fetcher: &F,
    storage: &Storage,
    opts: &WebsiteOptions,
    progress: &dyn ProgressReporter,
) -> bizscout_shared::Result<WebsiteStats> {
    let companies = storage.list_companies().await?;
    let mut stats = WebsiteStats {
        companies: companies.len(),
        ..WebsiteStats::default()
    };

    for (i, company) in companies.into_iter().enumerate() {
        progress.item(&company.company_name, i + 1, stats.companies);
        enrich_company(fetcher, storage, opts, company, &mut stats).await;
    }

    info!(
        updated = stats.updated,
        skipped = stats.skipped,
        fetch_failed = stats.fetch_failed,
        "website enrichment finished"
    );
    Ok(stats)
}

async fn enrich_company<F: PageFetcher>(
    fetcher: &F,
    storage: &Storage,
    opts: &WebsiteOptions,
    mut company: Company,
    stats: &mut WebsiteStats,
) {
    let Some(website) = company.scrapable_website().map(str::to_string) else {
        debug!(company = %company.company_name, "no website to scrape");
        stats.skipped += 1;
        return;
    };

    let emails = match fetcher.get(&website, opts.timeout).await {
        Ok(html) => extract_emails(&html),
        Err(e) => {
            warn!(company = %company.company_name, %website, error = %e, "site fetch failed");
            stats.fetch_failed += 1;
            return;
        }
    };

    let Some((primary, rest)) = emails.split_first() else {
        debug!(company = %company.company_name, %website, "no emails found");
        stats.no_emails += 1;
        return;
    };

    company.email = Some(primary.clone());
    company.other_emails = Some(rest.to_vec());
    company.scrape_timestamp = Utc::now();

    if let Err(e) = company.validate() {
        warn!(company = %company.company_name, error = %e, "validation failed, not updating");
        stats.invalid += 1;
        return;
    }

    match storage.update_company(&company).await {
        Ok(()) => {
            info!(company = %company.company_name, email = %primary, others = rest.len(), "stored site emails");
            stats.updated += 1;
        }
        Err(e) => {
            warn!(company = %company.company_name, error = %e, "update failed");
            stats.store_errors += 1;
        }
    }
}
