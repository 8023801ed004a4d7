//! Embedded libSQL record store for the companies and people collections.
//!
//! The [`Storage`] struct owns the database handle for the whole run: the
//! CLI opens it once at startup and drops it when the pipeline finishes.
//!
//! **Write rules:**
//! - Companies are inserted once by discovery, then replaced by id.
//!   Nothing is ever deleted.
//! - People are upserted by email with replace semantics.
//! - Callers validate records before handing them to the store.

mod migrations;

use std::path::Path;

use bizscout_shared::{BizScoutError, Company, Person, Result, website_domain};
use chrono::{DateTime, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Database, params};

const COMPANY_COLUMNS: &str = "id, company_name, address, industry, website, phone_number, email, \
     other_emails, linkedin_url, linkedin_description, year_founded, linkedin_employees, \
     search_term_used, scrape_timestamp, has_been_hunted";

const PERSON_COLUMNS: &str = "email, first_name, last_name, position, company_name, \
     linkedin_profile, has_been_hunted, scrape_timestamp";

/// How an incoming (name, website) pair relates to stored companies.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityMatch {
    /// No stored company shares either key.
    None,
    /// Matched on website (possibly also on name, same record).
    Website(Company),
    /// Matched on name only.
    Name(Company),
    /// Name and website point at two different records.
    Ambiguous { by_website: Company, by_name: Company },
}

impl IdentityMatch {
    /// The existing record this identity resolves to. Website wins ties.
    pub fn existing(&self) -> Option<&Company> {
        match self {
            Self::None => None,
            Self::Website(c) | Self::Name(c) => Some(c),
            Self::Ambiguous { by_website, .. } => Some(by_website),
        }
    }
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BizScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| BizScoutError::Connection(format!("{}: {e}", path.display())))?;

        Self::from_database(db).await
    }

    /// Open the database named by a connection URI: a filesystem path,
    /// a `file:` URI, or `:memory:`.
    pub async fn connect(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri == ":memory:" {
            let db = libsql::Builder::new_local(":memory:")
                .build()
                .await
                .map_err(|e| BizScoutError::Connection(e.to_string()))?;
            return Self::from_database(db).await;
        }

        if uri.contains("://") && !uri.starts_with("file://") {
            return Err(BizScoutError::Connection(format!(
                "unsupported database URI (expected a path, file: URI, or :memory:): {uri}"
            )));
        }

        let path = uri
            .strip_prefix("file://")
            .or_else(|| uri.strip_prefix("file:"))
            .unwrap_or(uri);
        Self::open(Path::new(path)).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| BizScoutError::Connection(e.to_string()))?;

        let storage = Self { db, conn };
        storage
            .ping()
            .await
            .map_err(|e| BizScoutError::Connection(e.to_string()))?;
        storage
            .run_migrations()
            .await
            .map_err(|e| BizScoutError::Connection(e.to_string()))?;
        Ok(storage)
    }

    /// Round-trip a trivial query to confirm the connection is usable.
    pub async fn ping(&self) -> Result<()> {
        let mut rows = self.conn.query("SELECT 1", params![]).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(_) => Ok(()),
            None => Err(BizScoutError::Storage("ping returned no rows".into())),
        }
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    BizScoutError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Company operations
    // -----------------------------------------------------------------------

    /// Insert a newly discovered company.
    pub async fn insert_company(&self, company: &Company) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO companies ({COMPANY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    company.id.as_str(),
                    company.company_name.as_str(),
                    company.address.as_deref(),
                    company.industry.as_deref(),
                    company.website.as_deref(),
                    company.phone_number.as_deref(),
                    company.email.as_deref(),
                    encode_emails(company.other_emails.as_deref())?,
                    company.linkedin_url.as_deref(),
                    company.linkedin_description.as_deref(),
                    company.year_founded.as_deref(),
                    company.linkedin_employees.as_deref(),
                    company.search_term_used.as_str(),
                    company.scrape_timestamp.to_rfc3339(),
                    i64::from(company.has_been_hunted),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Replace every stored field of the company with the same id.
    pub async fn update_company(&self, company: &Company) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE companies SET
                   company_name = ?2,
                   address = ?3,
                   industry = ?4,
                   website = ?5,
                   phone_number = ?6,
                   email = ?7,
                   other_emails = ?8,
                   linkedin_url = ?9,
                   linkedin_description = ?10,
                   year_founded = ?11,
                   linkedin_employees = ?12,
                   search_term_used = ?13,
                   scrape_timestamp = ?14,
                   has_been_hunted = ?15
                 WHERE id = ?1",
                params![
                    company.id.as_str(),
                    company.company_name.as_str(),
                    company.address.as_deref(),
                    company.industry.as_deref(),
                    company.website.as_deref(),
                    company.phone_number.as_deref(),
                    company.email.as_deref(),
                    encode_emails(company.other_emails.as_deref())?,
                    company.linkedin_url.as_deref(),
                    company.linkedin_description.as_deref(),
                    company.year_founded.as_deref(),
                    company.linkedin_employees.as_deref(),
                    company.search_term_used.as_str(),
                    company.scrape_timestamp.to_rfc3339(),
                    i64::from(company.has_been_hunted),
                ],
            )
            .await
            .map_err(db_err)?;

        if changed == 0 {
            return Err(BizScoutError::NotFound(format!("company {}", company.id)));
        }
        Ok(())
    }

    /// Get a company by storage id.
    pub async fn get_company(&self, id: &str) -> Result<Option<Company>> {
        self.query_company("id = ?1", id).await
    }

    /// First company stored with exactly this name.
    pub async fn find_company_by_name(&self, company_name: &str) -> Result<Option<Company>> {
        self.query_company("company_name = ?1", company_name).await
    }

    /// First company stored with exactly this (normalized) website.
    pub async fn find_company_by_website(&self, website: &str) -> Result<Option<Company>> {
        self.query_company("website = ?1", website).await
    }

    /// Resolve a candidate's identity against stored companies.
    ///
    /// A missing or blank website never matches.
    pub async fn find_company_by_identity(
        &self,
        company_name: &str,
        website: Option<&str>,
    ) -> Result<IdentityMatch> {
        let by_website = match website.map(str::trim).filter(|w| !w.is_empty()) {
            Some(w) => self.find_company_by_website(w).await?,
            None => None,
        };
        let by_name = self.find_company_by_name(company_name).await?;

        Ok(match (by_website, by_name) {
            (Some(w), Some(n)) if w.id == n.id => IdentityMatch::Website(w),
            (Some(w), Some(n)) => IdentityMatch::Ambiguous {
                by_website: w,
                by_name: n,
            },
            (Some(w), None) => IdentityMatch::Website(w),
            (None, Some(n)) => IdentityMatch::Name(n),
            (None, None) => IdentityMatch::None,
        })
    }

    /// Company whose website is hosted at `domain`, ignoring case.
    ///
    /// An exact host match wins over a subdomain of `domain`, which wins over
    /// any other website merely containing it. Ties go to the oldest row.
    pub async fn find_company_by_domain(&self, domain: &str) -> Result<Option<Company>> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .query_companies(
                &format!(
                    "SELECT {COMPANY_COLUMNS} FROM companies \
                     WHERE website IS NOT NULL AND instr(lower(website), ?1) > 0 ORDER BY rowid"
                ),
                params![domain.as_str()],
            )
            .await?;

        Ok(candidates
            .into_iter()
            .enumerate()
            .min_by_key(|(i, c)| (domain_rank(c, &domain), *i))
            .map(|(_, c)| c))
    }

    /// All companies, in insertion order.
    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        self.query_companies(
            &format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY rowid"),
            params![],
        )
        .await
    }

    /// Companies the domain-intelligence stage has not processed yet.
    pub async fn list_unhunted_companies(&self) -> Result<Vec<Company>> {
        self.query_companies(
            &format!(
                "SELECT {COMPANY_COLUMNS} FROM companies WHERE has_been_hunted = 0 ORDER BY rowid"
            ),
            params![],
        )
        .await
    }

    /// Number of stored companies.
    pub async fn count_companies(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM companies", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    async fn query_company(&self, predicate: &str, arg: &str) -> Result<Option<Company>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COMPANY_COLUMNS} FROM companies WHERE {predicate} ORDER BY rowid LIMIT 1"
                ),
                params![arg],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_company(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn query_companies(&self, sql: &str, params: impl IntoParams) -> Result<Vec<Company>> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_company(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Person operations
    // -----------------------------------------------------------------------

    /// Insert a person, or replace every field of the person with the same email.
    pub async fn upsert_person(&self, person: &Person) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO people ({PERSON_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(email) DO UPDATE SET
                       first_name = excluded.first_name,
                       last_name = excluded.last_name,
                       position = excluded.position,
                       company_name = excluded.company_name,
                       linkedin_profile = excluded.linkedin_profile,
                       has_been_hunted = excluded.has_been_hunted,
                       scrape_timestamp = excluded.scrape_timestamp"
                ),
                params![
                    person.email.as_str(),
                    person.first_name.as_str(),
                    person.last_name.as_str(),
                    person.position.as_deref(),
                    person.company_name.as_str(),
                    person.linkedin_profile.as_deref(),
                    i64::from(person.has_been_hunted),
                    person.scrape_timestamp.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a person by email.
    pub async fn get_person(&self, email: &str) -> Result<Option<Person>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PERSON_COLUMNS} FROM people WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_person(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// All people, in insertion order.
    pub async fn list_people(&self) -> Result<Vec<Person>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PERSON_COLUMNS} FROM people ORDER BY rowid"),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_person(&row)?);
        }
        Ok(results)
    }
}

fn db_err(e: libsql::Error) -> BizScoutError {
    BizScoutError::Storage(e.to_string())
}

/// 0 for the exact host, 1 for a subdomain, 2 for any other containing website.
fn domain_rank(company: &Company, domain: &str) -> u8 {
    match company.website.as_deref().and_then(website_domain) {
        Some(host) if host == domain => 0,
        Some(host) if host.ends_with(&format!(".{domain}")) => 1,
        _ => 2,
    }
}

fn encode_emails(emails: Option<&[String]>) -> Result<Option<String>> {
    emails
        .map(|list| {
            serde_json::to_string(list)
                .map_err(|e| BizScoutError::Storage(format!("encode other_emails: {e}")))
        })
        .transpose()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BizScoutError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`Company`].
fn row_to_company(row: &libsql::Row) -> Result<Company> {
    let other_emails = match row.get::<String>(7).ok() {
        Some(json) => Some(
            serde_json::from_str::<Vec<String>>(&json)
                .map_err(|e| BizScoutError::Storage(format!("decode other_emails: {e}")))?,
        ),
        None => None,
    };

    Ok(Company {
        id: row.get::<String>(0).map_err(db_err)?,
        company_name: row.get::<String>(1).map_err(db_err)?,
        address: row.get::<String>(2).ok(),
        industry: row.get::<String>(3).ok(),
        website: row.get::<String>(4).ok(),
        phone_number: row.get::<String>(5).ok(),
        email: row.get::<String>(6).ok(),
        other_emails,
        linkedin_url: row.get::<String>(8).ok(),
        linkedin_description: row.get::<String>(9).ok(),
        year_founded: row.get::<String>(10).ok(),
        linkedin_employees: row.get::<String>(11).ok(),
        search_term_used: row.get::<String>(12).map_err(db_err)?,
        scrape_timestamp: parse_timestamp(&row.get::<String>(13).map_err(db_err)?)?,
        has_been_hunted: row.get::<i64>(14).map_err(db_err)? != 0,
    })
}

/// Convert a database row to a [`Person`].
fn row_to_person(row: &libsql::Row) -> Result<Person> {
    Ok(Person {
        email: row.get::<String>(0).map_err(db_err)?,
        first_name: row.get::<String>(1).map_err(db_err)?,
        last_name: row.get::<String>(2).map_err(db_err)?,
        position: row.get::<String>(3).ok(),
        company_name: row.get::<String>(4).map_err(db_err)?,
        linkedin_profile: row.get::<String>(5).ok(),
        has_been_hunted: row.get::<i64>(6).map_err(db_err)? != 0,
        scrape_timestamp: parse_timestamp(&row.get::<String>(7).map_err(db_err)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("bizscout_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn company(name: &str, website: Option<&str>) -> Company {
        let mut c = Company::new(name, "roofing in Oakville Ontario");
        c.website = website.map(String::from);
        c
    }

    fn person(email: &str, first_name: &str) -> Person {
        Person {
            email: email.into(),
            first_name: first_name.into(),
            last_name: String::new(),
            position: None,
            company_name: "Acme Roofing".into(),
            linkedin_profile: None,
            has_been_hunted: true,
            scrape_timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
        storage.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("bizscout_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn connect_accepts_memory_and_file_uris() {
        let mem = Storage::connect(":memory:").await.expect("memory db");
        assert_eq!(mem.count_companies().await.unwrap(), 0);

        let tmp = std::env::temp_dir().join(format!("bizscout_test_{}.db", Uuid::now_v7()));
        let uri = format!("file:{}", tmp.display());
        Storage::connect(&uri).await.expect("file uri");
        assert!(tmp.exists());
    }

    #[tokio::test]
    async fn connect_rejects_remote_uri() {
        for uri in ["libsql://db.example.com", "mongodb+srv://user@cluster.example.net/"] {
            let result = Storage::connect(uri).await;
            assert!(matches!(result, Err(BizScoutError::Connection(_))), "{uri}");
        }
    }

    #[tokio::test]
    async fn company_insert_and_update() {
        let storage = test_storage().await;
        let mut acme = company("Acme Roofing", Some("https://acme.ca/"));
        acme.phone_number = Some("(905) 555-0100".into());
        storage.insert_company(&acme).await.expect("insert");

        let found = storage.get_company(&acme.id).await.unwrap().expect("stored");
        assert_eq!(found, acme);
        assert_eq!(found.other_emails, None);

        acme.email = Some("info@acme.ca".into());
        acme.other_emails = Some(vec!["sales@acme.ca".into()]);
        acme.has_been_hunted = true;
        storage.update_company(&acme).await.expect("update");

        let found = storage.get_company(&acme.id).await.unwrap().unwrap();
        assert_eq!(found.email.as_deref(), Some("info@acme.ca"));
        assert_eq!(found.other_emails, Some(vec!["sales@acme.ca".to_string()]));
        assert!(found.has_been_hunted);
        assert_eq!(storage.count_companies().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_missing_company_is_not_found() {
        let storage = test_storage().await;
        let ghost = company("Ghost Roofing", None);
        let result = storage.update_company(&ghost).await;
        assert!(matches!(result, Err(BizScoutError::NotFound(_))));
    }

    #[tokio::test]
    async fn identity_prefers_website_and_flags_conflicts() {
        let storage = test_storage().await;
        let acme = company("Acme Roofing", Some("https://acme.ca/"));
        let best = company("Best Roofing", Some("https://best.ca/"));
        let bare = company("Bare Roofing", None);
        storage.insert_company(&acme).await.unwrap();
        storage.insert_company(&best).await.unwrap();
        storage.insert_company(&bare).await.unwrap();

        let m = storage
            .find_company_by_identity("Acme Roofing", Some("https://acme.ca/"))
            .await
            .unwrap();
        assert_eq!(m, IdentityMatch::Website(acme.clone()));

        let m = storage
            .find_company_by_identity("Acme Roofing", Some("https://other.ca/"))
            .await
            .unwrap();
        assert_eq!(m, IdentityMatch::Name(acme.clone()));

        let m = storage
            .find_company_by_identity("Acme Roofing", Some("https://best.ca/"))
            .await
            .unwrap();
        assert!(matches!(m, IdentityMatch::Ambiguous { .. }));
        assert_eq!(m.existing().map(|c| c.id.as_str()), Some(best.id.as_str()));

        // A missing website must not match other companies without one.
        let m = storage.find_company_by_identity("New Roofing", None).await.unwrap();
        assert_eq!(m, IdentityMatch::None);
    }

    #[tokio::test]
    async fn domain_lookup_is_case_insensitive() {
        let storage = test_storage().await;
        let acme = company("Acme Roofing", Some("https://www.Acme.CA/"));
        storage.insert_company(&acme).await.unwrap();

        let found = storage.find_company_by_domain("ACME.ca").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(acme.id));
        assert!(storage.find_company_by_domain("best.ca").await.unwrap().is_none());
        assert!(storage.find_company_by_domain("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn domain_lookup_prefers_exact_host_over_older_lookalike() {
        let storage = test_storage().await;
        let big = company("BigAcme Supply", Some("https://bigacme.ca/"));
        let shop = company("Acme Shop", Some("https://shop.acme.ca/"));
        let acme = company("Acme Roofing", Some("https://acme.ca/"));
        for c in [&big, &shop, &acme] {
            storage.insert_company(c).await.unwrap();
        }

        let found = storage.find_company_by_domain("acme.ca").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(acme.id.clone()));

        // No exact host: a subdomain beats a website that merely contains it.
        let mut moved = acme.clone();
        moved.website = Some("https://acme.com/".into());
        storage.update_company(&moved).await.unwrap();
        let found = storage.find_company_by_domain("acme.ca").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(shop.id));

        // Only lookalikes left: the oldest one is used.
        let found = storage.find_company_by_domain("cme.ca").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(big.id));
    }

    #[tokio::test]
    async fn unhunted_listing_excludes_processed() {
        let storage = test_storage().await;
        let fresh = company("Fresh Roofing", Some("https://fresh.ca/"));
        let mut done = company("Done Roofing", Some("https://done.ca/"));
        done.has_been_hunted = true;
        storage.insert_company(&fresh).await.unwrap();
        storage.insert_company(&done).await.unwrap();

        let pending = storage.list_unhunted_companies().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].company_name, "Fresh Roofing");

        let all = storage.list_companies().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].company_name, "Fresh Roofing");
    }

    #[tokio::test]
    async fn person_upsert_replaces_by_email() {
        let storage = test_storage().await;
        let mut jane = person("jane@acme.ca", "Jane");
        jane.position = Some("Owner".into());
        storage.upsert_person(&jane).await.expect("insert");

        let replacement = Person {
            last_name: "Doe".into(),
            position: None,
            ..person("jane@acme.ca", "Janet")
        };
        storage.upsert_person(&replacement).await.expect("replace");

        let found = storage.get_person("jane@acme.ca").await.unwrap().unwrap();
        assert_eq!(found.first_name, "Janet");
        assert_eq!(found.last_name, "Doe");
        assert_eq!(found.position, None);
        assert_eq!(storage.list_people().await.unwrap().len(), 1);
    }
}
