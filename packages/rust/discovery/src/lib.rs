//! Places search client used to discover businesses.
//!
//! Discovery runs a free-text query per (industry, location) pair, follows
//! the result pages, and fetches a detail record for every place. The
//! [`PlacesApi`] trait is the seam the pipeline depends on;
//! [`GooglePlacesClient`] is the production implementation.

use std::future::Future;
use std::time::Duration;

use bizscout_shared::{BizScoutError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// Detail fields requested for every place.
pub const DETAIL_FIELDS: &str = "name,formatted_address,formatted_phone_number,website";

/// Default timeout in seconds for places requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for places requests.
const USER_AGENT: &str = concat!("bizscout/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One hit from a text search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaceSummary {
    pub place_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub formatted_address: Option<String>,
}

/// One page of text-search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub results: Vec<PlaceSummary>,
    /// Present when another page exists. Usable only after a short delay.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Detail record for one place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlaceDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub formatted_phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

// ---------------------------------------------------------------------------
// PlacesApi
// ---------------------------------------------------------------------------

/// Places/maps search operations consumed by discovery.
pub trait PlacesApi: Send + Sync {
    /// Run a text search, or fetch the page behind `page_token`.
    fn search(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<SearchPage>> + Send;

    /// Fetch name, address, phone, and website for one place.
    fn details(&self, place_id: &str) -> impl Future<Output = Result<PlaceDetails>> + Send;
}

/// Strip the query string (everything from the first `?`) from a website.
///
/// Tracking parameters are not part of a site's identity.
pub fn normalize_website(website: &str) -> String {
    let website = website.trim();
    match website.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => website.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Google Places client
// ---------------------------------------------------------------------------

/// Envelope shared by the text-search and details endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
struct DetailsBody {
    #[serde(default)]
    result: Option<PlaceDetails>,
}

/// Google Places (legacy web service) client.
pub struct GooglePlacesClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl GooglePlacesClient {
    /// Create a client against `base_url` (e.g. `https://maps.googleapis.com`).
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BizScoutError::config(format!("invalid places base URL '{base_url}': {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| BizScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BizScoutError::config(format!("invalid places endpoint {path}: {e}")))
    }

    async fn get_json<T>(&self, url: Url, params: &[(&str, &str)]) -> Result<Envelope<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .get(url.clone())
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BizScoutError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| BizScoutError::parse(format!("{url}: {e}")))?;

        match envelope.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(envelope),
            other => Err(BizScoutError::Network(format!(
                "places API returned {other}: {}",
                envelope.error_message.as_deref().unwrap_or("no error message")
            ))),
        }
    }
}

impl PlacesApi for GooglePlacesClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, page_token: Option<&str>) -> Result<SearchPage> {
        let url = self.endpoint("/maps/api/place/textsearch/json")?;
        let mut params = vec![("query", query)];
        if let Some(token) = page_token {
            params.push(("pagetoken", token));
        }

        let envelope: Envelope<SearchPage> = self.get_json(url, &params).await?;
        debug!(
            results = envelope.body.results.len(),
            has_next = envelope.body.next_page_token.is_some(),
            "places page received"
        );
        Ok(envelope.body)
    }

    #[instrument(skip(self))]
    async fn details(&self, place_id: &str) -> Result<PlaceDetails> {
        let url = self.endpoint("/maps/api/place/details/json")?;
        let envelope: Envelope<DetailsBody> = self
            .get_json(url, &[("place_id", place_id), ("fields", DETAIL_FIELDS)])
            .await?;
        Ok(envelope.body.result.unwrap_or_default())
    }
}

/// Classify a transport failure.
fn request_error(url: &Url, e: reqwest::Error) -> BizScoutError {
    if e.is_timeout() {
        BizScoutError::Timeout {
            url: url.to_string(),
        }
    } else {
        BizScoutError::Network(format!("{url}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn normalize_strips_query_string() {
        assert_eq!(normalize_website("https://acme.ca/?utm=1"), "https://acme.ca/");
        assert_eq!(
            normalize_website("https://acme.ca/contact?a=1?b=2"),
            "https://acme.ca/contact"
        );
        assert_eq!(normalize_website(" https://acme.ca/ "), "https://acme.ca/");
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(GooglePlacesClient::new("not a url", "key").is_err());
    }

    #[tokio::test]
    async fn search_follows_token_param() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/place/textsearch/json"))
            .and(query_param("query", "roofing in Oakville Ontario"))
            .and(query_param("pagetoken", "tok-2"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [
                    {"place_id": "p2", "name": "Best Roofing", "formatted_address": "2 Main St"}
                ]
            })))
            .mount(&server)
            .await;

        let client = GooglePlacesClient::new(&server.uri(), "secret").unwrap();
        let page = client
            .search("roofing in Oakville Ontario", Some("tok-2"))
            .await
            .unwrap();

        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].place_id, "p2");
        assert_eq!(page.next_page_token, None);
    }

    #[tokio::test]
    async fn search_reports_next_page_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/place/textsearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [{"place_id": "p1", "name": "Acme Roofing"}],
                "next_page_token": "tok-2"
            })))
            .mount(&server)
            .await;

        let client = GooglePlacesClient::new(&server.uri(), "secret").unwrap();
        let page = client.search("roofing in Oakville Ontario", None).await.unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("tok-2"));
        assert_eq!(page.results[0].formatted_address, None);
    }

    #[tokio::test]
    async fn unready_token_is_an_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/place/textsearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "INVALID_REQUEST",
                "results": []
            })))
            .mount(&server)
            .await;

        let client = GooglePlacesClient::new(&server.uri(), "secret").unwrap();
        let err = client.search("q", Some("too-soon")).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn zero_results_is_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/place/textsearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ZERO_RESULTS",
                "results": []
            })))
            .mount(&server)
            .await;

        let client = GooglePlacesClient::new(&server.uri(), "secret").unwrap();
        let page = client.search("q", None).await.unwrap();
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn details_requests_contact_fields() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/place/details/json"))
            .and(query_param("place_id", "p1"))
            .and(query_param("fields", DETAIL_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": {
                    "name": "Acme Roofing",
                    "formatted_phone_number": "(905) 555-0100",
                    "website": "https://acme.ca/?utm=1"
                }
            })))
            .mount(&server)
            .await;

        let client = GooglePlacesClient::new(&server.uri(), "secret").unwrap();
        let details = client.details("p1").await.unwrap();
        assert_eq!(details.website.as_deref(), Some("https://acme.ca/?utm=1"));
        assert_eq!(details.formatted_phone_number.as_deref(), Some("(905) 555-0100"));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GooglePlacesClient::new(&server.uri(), "secret").unwrap();
        let err = client.details("p1").await.unwrap_err();
        assert!(matches!(err, BizScoutError::Http { status: 500, .. }));
    }
}
