//! SQL migration definitions for the bizscout database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: companies, people",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Businesses found through places search
CREATE TABLE IF NOT EXISTS companies (
    id                   TEXT PRIMARY KEY,
    company_name         TEXT NOT NULL,
    address              TEXT,
    industry             TEXT,
    website              TEXT,
    phone_number         TEXT,
    email                TEXT,
    other_emails         TEXT,
    linkedin_url         TEXT,
    linkedin_description TEXT,
    year_founded         TEXT,
    linkedin_employees   TEXT,
    search_term_used     TEXT NOT NULL,
    scrape_timestamp     TEXT NOT NULL,
    has_been_hunted      INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_companies_name ON companies(company_name);
CREATE INDEX IF NOT EXISTS idx_companies_website ON companies(website);
CREATE INDEX IF NOT EXISTS idx_companies_hunted ON companies(has_been_hunted);

-- Named contacts, keyed by email
CREATE TABLE IF NOT EXISTS people (
    email            TEXT PRIMARY KEY,
    first_name       TEXT NOT NULL,
    last_name        TEXT NOT NULL,
    position         TEXT,
    company_name     TEXT NOT NULL,
    linkedin_profile TEXT,
    has_been_hunted  INTEGER NOT NULL DEFAULT 0,
    scrape_timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_people_company ON people(company_name);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
