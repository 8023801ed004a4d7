//! Domain-intelligence lookups (organization profile and known addresses).
//!
//! [`DomainIntelApi`] is the seam the enrichment stage depends on;
//! [`HunterClient`] implements it against the Hunter.io domain-search API.

use std::future::Future;
use std::time::Duration;

pub use bizscout_shared::website_domain;
use bizscout_shared::{BizScoutError, EnrichmentConfig, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for enrichment requests.
const USER_AGENT: &str = concat!("bizscout/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Category the provider assigns to an address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailKind {
    /// Belongs to an individual.
    Personal,
    /// Role or shared inbox (info@, sales@).
    Generic,
    #[default]
    #[serde(other)]
    Other,
}

/// One address the provider knows for the domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailEntry {
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: EmailKind,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

/// Everything the provider returned for one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DomainReport {
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub emails: Vec<EmailEntry>,
}

impl DomainReport {
    /// Values of every generic-category address, in provider order.
    pub fn generic_emails(&self) -> impl Iterator<Item = &str> {
        self.emails
            .iter()
            .filter(|e| e.kind == EmailKind::Generic)
            .map(|e| e.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// DomainIntelApi
// ---------------------------------------------------------------------------

/// Domain-intelligence lookup consumed by the enrichment stage.
pub trait DomainIntelApi: Send + Sync {
    fn lookup(&self, domain: &str) -> impl Future<Output = Result<DomainReport>> + Send;
}

// ---------------------------------------------------------------------------
// Hunter client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DomainSearchResponse {
    data: DomainReport,
}

/// Hunter.io domain-search client.
pub struct HunterClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HunterClient {
    /// Create a client from the `[enrichment]` settings.
    pub fn new(config: &EnrichmentConfig, api_key: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            BizScoutError::config(format!(
                "invalid enrichment base URL '{}': {e}",
                config.base_url
            ))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BizScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }
}

impl DomainIntelApi for HunterClient {
    #[instrument(skip(self))]
    async fn lookup(&self, domain: &str) -> Result<DomainReport> {
        let url = self
            .base_url
            .join("/v2/domain-search")
            .map_err(|e| BizScoutError::config(format!("invalid enrichment endpoint: {e}")))?;

        let response = self
            .client
            .get(url.clone())
            .query(&[("domain", domain), ("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BizScoutError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    BizScoutError::Network(format!("{url}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BizScoutError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: DomainSearchResponse = response
            .json()
            .await
            .map_err(|e| BizScoutError::parse(format!("domain-search for {domain}: {e}")))?;

        debug!(
            organization = body.data.organization.as_deref().unwrap_or(""),
            emails = body.data.emails.len(),
            "domain report received"
        );
        Ok(body.data)
    }
}
