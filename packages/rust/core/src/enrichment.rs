//! Domain enrichment stage: company profile and contacts from domain intel.
//!
//! Every company not yet hunted is looked up by its website's domain. The
//! report updates the company itself and then routes each address it lists:
//!
//! - `personal` with a first name → upserted as a [`Person`]
//! - anything else that is a valid email → appended to the owning
//!   company's `other_emails`, once
//!
//! A failed lookup writes nothing, so the company is retried on the next run.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use bizscout_intel::{DomainIntelApi, DomainReport, EmailEntry, EmailKind};
use bizscout_shared::{
    Company, Person, Record, Result, UNKNOWN_COMPANY, clean_email, email_domain, is_valid_email,
};
use bizscout_storage::Storage;

use crate::pipeline::ProgressReporter;

/// Counters for one domain-enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainStats {
    pub companies: usize,
    /// No website to derive a domain from.
    pub skipped: usize,
    pub lookup_failed: usize,
    /// Company vanished between listing and merge.
    pub not_found: usize,
    pub hunted: usize,
    pub people_upserted: usize,
    pub emails_appended: usize,
    /// Addresses already on the owner, or with no owning company.
    pub emails_ignored: usize,
    pub invalid: usize,
    pub store_errors: usize,
}

/// Enrich every company that has not been hunted yet.
#[instrument(skip_all)]
pub async fn run_domain_enrichment<I: DomainIntelApi>(
    intel: &I,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<DomainStats> {
    let companies = storage.list_unhunted_companies().await?;
    let mut stats = DomainStats {
        companies: companies.len(),
        ..DomainStats::default()
    };

    for (i, company) in companies.iter().enumerate() {
        progress.item(&company.company_name, i + 1, stats.companies);
        hunt_company(intel, storage, company, &mut stats).await;
    }

    info!(
        hunted = stats.hunted,
        people = stats.people_upserted,
        lookup_failed = stats.lookup_failed,
        "domain enrichment finished"
    );
    Ok(stats)
}

async fn hunt_company<I: DomainIntelApi>(
    intel: &I,
    storage: &Storage,
    company: &Company,
    stats: &mut DomainStats,
) {
    let Some(domain) = company.domain() else {
        debug!(company = %company.company_name, "no website domain, leaving unhunted");
        stats.skipped += 1;
        return;
    };

    let report = match intel.lookup(&domain).await {
        Ok(report) => report,
        Err(e) => {
            warn!(company = %company.company_name, %domain, error = %e, "domain lookup failed, will retry next run");
            stats.lookup_failed += 1;
            return;
        }
    };

    let existing = match reread(storage, company, &domain).await {
        Ok(Some(existing)) => existing,
        Ok(None) => {
            warn!(%domain, "no stored company matches domain, skipping");
            stats.not_found += 1;
            return;
        }
        Err(e) => {
            warn!(%domain, error = %e, "company re-lookup failed, skipping");
            stats.store_errors += 1;
            return;
        }
    };

    let merged = merge_report(existing, &report);
    match merged.validate() {
        Ok(()) => match storage.update_company(&merged).await {
            Ok(()) => {
                info!(company = %merged.company_name, %domain, "company hunted");
                stats.hunted += 1;
            }
            Err(e) => {
                warn!(company = %merged.company_name, error = %e, "company update failed");
                stats.store_errors += 1;
            }
        },
        Err(e) => {
            warn!(company = %merged.company_name, error = %e, "validation failed, company stays unhunted");
            stats.invalid += 1;
        }
    }

    for entry in &report.emails {
        route_email(storage, entry, stats).await;
    }
}

/// Current state of the listed company; earlier writes in this run may have
/// changed it. Falls back to a domain lookup if the record moved off `domain`.
async fn reread(storage: &Storage, company: &Company, domain: &str) -> Result<Option<Company>> {
    if let Some(current) = storage.get_company(&company.id).await? {
        if current.domain().is_some_and(|d| d == domain) {
            return Ok(Some(current));
        }
    }
    storage.find_company_by_domain(domain).await
}

/// Fold a domain report into the stored company.
///
/// The organization name replaces `company_name` when present. LinkedIn
/// fields are overwritten only when the report has them. `other_emails`
/// becomes the report's valid generic addresses, and the company is marked
/// hunted.
pub fn merge_report(mut company: Company, report: &DomainReport) -> Company {
    if let Some(org) = non_blank(report.organization.as_deref()) {
        company.company_name = org.to_string();
    }
    if let Some(linkedin) = non_blank(report.linkedin.as_deref()) {
        company.linkedin_url = Some(linkedin.to_string());
    }
    if let Some(description) = non_blank(report.description.as_deref()) {
        company.linkedin_description = Some(description.to_string());
    }

    let mut generic: Vec<String> = Vec::new();
    for email in report.generic_emails().map(clean_email) {
        if is_valid_email(&email) && !generic.contains(&email) {
            generic.push(email);
        }
    }
    company.other_emails = Some(generic);

    company.has_been_hunted = true;
    company.scrape_timestamp = Utc::now();
    company
}

/// Route one reported address to a person record or its owner's email list.
async fn route_email(storage: &Storage, entry: &EmailEntry, stats: &mut DomainStats) {
    let email = clean_email(&entry.value);
    if !is_valid_email(&email) {
        debug!(email = %entry.value, "skipping invalid email");
        stats.invalid += 1;
        return;
    }

    let owner = match email_domain(&email) {
        Some(domain) => match storage.find_company_by_domain(&domain).await {
            Ok(owner) => owner,
            Err(e) => {
                warn!(%email, error = %e, "owner lookup failed, skipping email");
                stats.store_errors += 1;
                return;
            }
        },
        None => None,
    };

    let first_name = non_blank(entry.first_name.as_deref());
    match (entry.kind, first_name) {
        (EmailKind::Personal, Some(first_name)) => {
            let person = Person {
                email,
                first_name: first_name.to_string(),
                last_name: entry.last_name.clone().unwrap_or_default(),
                position: entry.position.clone(),
                company_name: owner
                    .map(|c| c.company_name)
                    .unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
                linkedin_profile: entry.linkedin.clone(),
                has_been_hunted: true,
                scrape_timestamp: Utc::now(),
            };
            save_person(storage, &person, stats).await;
        }
        _ => match owner {
            Some(owner) => append_email(storage, owner, email, stats).await,
            None => {
                debug!(%email, "no owning company for email, ignoring");
                stats.emails_ignored += 1;
            }
        },
    }
}

async fn save_person(storage: &Storage, person: &Person, stats: &mut DomainStats) {
    if let Err(e) = person.validate() {
        warn!(email = %person.email, error = %e, "validation failed, skipping person");
        stats.invalid += 1;
        return;
    }

    match storage.upsert_person(person).await {
        Ok(()) => {
            info!(
                email = %person.email,
                first_name = %person.first_name,
                last_name = %person.last_name,
                company = %person.company_name,
                "stored person"
            );
            stats.people_upserted += 1;
        }
        Err(e) => {
            warn!(email = %person.email, error = %e, "person upsert failed");
            stats.store_errors += 1;
        }
    }
}

/// Append `email` to the owner's `other_emails` unless already listed.
async fn append_email(storage: &Storage, mut owner: Company, email: String, stats: &mut DomainStats) {
    if owner.has_other_email(&email) {
        debug!(%email, company = %owner.company_name, "email already on company");
        stats.emails_ignored += 1;
        return;
    }

    owner.other_emails.get_or_insert_with(Vec::new).push(email.clone());
    owner.scrape_timestamp = Utc::now();

    if let Err(e) = owner.validate() {
        warn!(company = %owner.company_name, error = %e, "validation failed, not appending email");
        stats.invalid += 1;
        return;
    }

    match storage.update_company(&owner).await {
        Ok(()) => {
            info!(%email, company = %owner.company_name, "added email to company");
            stats.emails_appended += 1;
        }
        Err(e) => {
            warn!(company = %owner.company_name, error = %e, "company update failed");
            stats.store_errors += 1;
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
