//! Single-page website fetcher.
//!
//! Fetch failures are classified into timeout, HTTP status, and network
//! errors so the caller can log the reason and degrade to "no emails".

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use bizscout_shared::{BizScoutError, CrawlConfig, Result};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for site requests.
const USER_AGENT: &str = concat!("bizscout/", env!("CARGO_PKG_VERSION"));

/// Redirects followed before giving up on a site.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// Retrieves the HTML of a company website.
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return the body text, bounded by `timeout`.
    fn get(&self, url: &str, timeout: Duration) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// reqwest-backed [`PageFetcher`] with private-network protection.
pub struct HttpFetcher {
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl HttpFetcher {
    /// Create a fetcher honoring the crawl settings.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| BizScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for integration tests).
    #[cfg(test)]
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<String> {
        let url = parse_site_url(url)?;

        if !self.allow_localhost && is_ssrf_target(&url) {
            return Err(BizScoutError::Network(format!(
                "{url}: refusing to fetch private or non-HTTP address"
            )));
        }

        debug!(%url, "fetching site");

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BizScoutError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(&url, e))
    }
}

/// Parse a stored website, assuming `http://` when the scheme is missing.
fn parse_site_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("http://{raw}")))
        .map_err(|e| BizScoutError::Network(format!("invalid website '{raw}': {e}")))
}

fn classify(url: &Url, e: reqwest::Error) -> BizScoutError {
    if e.is_timeout() {
        BizScoutError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = e.status() {
        BizScoutError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        BizScoutError::Network(format!("{url}: {e}"))
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost" || host.ends_with(".local") || host.ends_with(".internal") {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
