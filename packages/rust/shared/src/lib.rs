//! Shared types, error model, validation, and configuration for bizscout.
//!
//! This crate is the foundation depended on by all other bizscout crates.
//! It provides:
//! - [`BizScoutError`]: the unified error type
//! - Record types ([`Company`], [`Person`], [`SearchTarget`])
//! - The schema validator ([`schema`]) and email rules ([`email`])
//! - Configuration ([`AppConfig`], config loading, secret resolution)

pub mod config;
pub mod email;
pub mod error;
pub mod schema;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, DiscoveryConfig, EnrichmentConfig, Secrets, SecretsConfig,
    config_dir, config_file_path, init_config, init_config_at, load_config, load_config_from,
    resolve_secrets, to_toml,
};
pub use email::{EMAIL_PATTERN, clean_email, email_domain, is_valid_email};
pub use error::{BizScoutError, Result};
pub use schema::{FieldError, Record, ValidationError};
pub use types::{Company, NO_WEBSITE, Person, SearchTarget, UNKNOWN_COMPANY, website_domain};
