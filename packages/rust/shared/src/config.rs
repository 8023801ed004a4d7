//! Application configuration for bizscout.
//!
//! User config lives at `~/.bizscout/bizscout.toml`. Secrets never live in
//! the file: it only names the environment variables that hold them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BizScoutError, Result};
use crate::types::SearchTarget;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bizscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bizscout";

// ---------------------------------------------------------------------------
// Config structs (matching bizscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ordered (industry, location) pairs to discover.
    #[serde(default = "default_searches")]
    pub searches: Vec<SearchTarget>,

    /// Places search settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Website scraping settings.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Domain-intelligence API settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Environment variable names for credentials.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            searches: default_searches(),
            discovery: DiscoveryConfig::default(),
            crawl: CrawlConfig::default(),
            enrichment: EnrichmentConfig::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

fn default_searches() -> Vec<SearchTarget> {
    [
        "Oakville", "Markham", "Mississauga", "Burlington", "Richmond Hill", "Aurora",
        "Brampton", "Oshawa", "Kitchener", "Hamilton", "Vaughan", "Toronto",
    ]
    .into_iter()
    .map(|city| SearchTarget::new("roofing", format!("{city} Ontario")))
    .collect()
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Wait between result pages; the next-page token is not usable immediately.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,

    /// Places API origin.
    #[serde(default = "default_places_base_url")]
    pub places_base_url: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay(),
            places_base_url: default_places_base_url(),
        }
    }
}

fn default_page_delay() -> u64 {
    2000
}
fn default_places_base_url() -> String {
    "https://maps.googleapis.com".into()
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Per-site fetch timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Accept self-signed or expired certificates on company sites.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            accept_invalid_certs: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Domain-search API origin.
    #[serde(default = "default_enrichment_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: default_enrichment_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_enrichment_base_url() -> String {
    "https://api.hunter.io".into()
}

/// `[secrets]` section: names of env vars, never the values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_maps_key_env")]
    pub maps_api_key_env: String,

    #[serde(default = "default_enrichment_key_env")]
    pub enrichment_api_key_env: String,

    #[serde(default = "default_database_uri_env")]
    pub database_uri_env: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            maps_api_key_env: default_maps_key_env(),
            enrichment_api_key_env: default_enrichment_key_env(),
            database_uri_env: default_database_uri_env(),
        }
    }
}

fn default_maps_key_env() -> String {
    "GOOGLE_MAPS_API_KEY".into()
}
fn default_enrichment_key_env() -> String {
    "HUNTER_API_KEY".into()
}
fn default_database_uri_env() -> String {
    "DATABASE_URI".into()
}

// ---------------------------------------------------------------------------
// Secrets (runtime, resolved from the environment)
// ---------------------------------------------------------------------------

/// Credential values read from the process environment.
#[derive(Clone)]
pub struct Secrets {
    pub maps_api_key: String,
    pub enrichment_api_key: String,
    pub database_uri: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("maps_api_key", &"<redacted>")
            .field("enrichment_api_key", &"<redacted>")
            .field("database_uri", &self.database_uri)
            .finish()
    }
}

/// Read all three secrets, failing on the first missing or empty one.
pub fn resolve_secrets(config: &AppConfig) -> Result<Secrets> {
    Ok(Secrets {
        maps_api_key: require_env(&config.secrets.maps_api_key_env)?,
        enrichment_api_key: require_env(&config.secrets.enrichment_api_key_env)?,
        database_uri: require_env(&config.secrets.database_uri_env)?,
    })
}

fn require_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(BizScoutError::config(format!(
            "{var_name} is not set. Export it or add it to a .env file."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bizscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BizScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bizscout/bizscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BizScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BizScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| BizScoutError::io(dir, e))?;
    }

    let content = to_toml(&AppConfig::default())?;
    std::fs::write(path, content).map_err(|e| BizScoutError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

/// Render a config as pretty TOML.
pub fn to_toml(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| BizScoutError::config(e.to_string()))
}
