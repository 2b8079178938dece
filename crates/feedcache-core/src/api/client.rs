//! HTTP client for the activity feed and the natural-event API.
//!
//! The feed request is conditional (`If-Modified-Since`) and hands back the
//! raw response so the caller can branch on status and headers. Category and
//! event requests decode the provider's JSON envelope directly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::merger::EventSource;
use crate::models::{
    Category, CategoryResponse, Envelope, Event, EventResponse, EventStatus, FeedEvent,
    FeedEventResponse,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// GitHub rejects requests without a User-Agent
const USER_AGENT: &str = concat!("feedcache/", env!("CARGO_PKG_VERSION"));

/// Path of the category list, relative to the event API base URL
const CATEGORIES_ENDPOINT: &str = "/categories";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay for rate limiting, doubled on each retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// A feed response read to completion.
///
/// Owned once and inspected by both the cache branch and the token branch of
/// a refresh, so a single request serves both.
#[derive(Debug, Clone)]
pub struct FeedResponse {
    pub status: StatusCode,
    pub last_modified: Option<String>,
    pub body: Vec<u8>,
}

impl FeedResponse {
    /// Status in [200, 300): the body carries events
    pub fn has_events(&self) -> bool {
        self.status.is_success()
    }

    /// Status in [200, 400): the validator header, if any, is trustworthy
    pub fn accepts_token(&self) -> bool {
        (200..400).contains(&self.status.as_u16())
    }

    pub fn decode_events(&self) -> Result<Vec<FeedEvent>, ApiError> {
        let raw: Vec<FeedEventResponse> = serde_json::from_slice(&self.body)?;
        Ok(raw.iter().map(|e| e.to_feed_event()).collect())
    }
}

/// API client for the feed and event providers.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    eonet_base_url: String,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(eonet_base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            eonet_base_url: eonet_base_url.into(),
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.eonet_api_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    // ===== Activity feed =====

    /// Fetch the feed, sending `token` as `If-Modified-Since` when known.
    ///
    /// The stored `Last-Modified` value goes out under the request-side
    /// validator name, not echoed back as `Last-Modified`. A blank
    /// `Last-Modified` header is treated as absent.
    ///
    /// Any HTTP status is returned as a `FeedResponse`; only transport
    /// failures are errors.
    pub async fn fetch_feed(&self, url: &str, token: Option<&str>) -> Result<FeedResponse, ApiError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(header::IF_MODIFIED_SINCE, token);
        }

        let response = request.send().await?;
        let status = response.status();
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(url = url, status = %status, bytes = body.len(), "Feed response received");

        Ok(FeedResponse {
            status,
            last_modified,
            body,
        })
    }

    // ===== Categories and events =====

    /// Resolve an endpoint that is either absolute or relative to the API base
    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.eonet_base_url.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get_content<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self.client.get(url.clone()).query(query).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let bytes = response.bytes().await?;
                    let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
                    return Ok(envelope.content);
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Fetch the category list, events not yet attached
    pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        let url = self.endpoint_url(CATEGORIES_ENDPOINT)?;
        let raw: Vec<CategoryResponse> = self.get_content(url, &[]).await?;
        Ok(raw.iter().map(|c| c.to_category()).collect())
    }

    /// Fetch events of one status from a category endpoint
    pub async fn fetch_events(
        &self,
        endpoint: &str,
        days: u32,
        status: EventStatus,
    ) -> Result<Vec<Event>, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        let query = [
            ("days", days.to_string()),
            ("status", status.as_str().to_string()),
        ];
        let raw: Vec<EventResponse> = self.get_content(url, &query).await?;
        Ok(raw.iter().map(|e| e.to_event()).collect())
    }
}

#[async_trait]
impl EventSource for ApiClient {
    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.fetch_categories().await
    }

    async fn events(
        &self,
        endpoint: &str,
        days: u32,
        status: EventStatus,
    ) -> Result<Vec<Event>, ApiError> {
        self.fetch_events(endpoint, days, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("https://eonet.example/api/v2.1/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_url_joins_relative_paths() {
        let url = client().endpoint_url("/categories/8").unwrap();
        assert_eq!(url.as_str(), "https://eonet.example/api/v2.1/categories/8");
    }

    #[test]
    fn test_endpoint_url_keeps_absolute_links() {
        let url = client()
            .endpoint_url("https://other.example/api/v3/categories/wildfires")
            .unwrap();
        assert_eq!(url.host_str(), Some("other.example"));
    }

    #[test]
    fn test_endpoint_url_rejects_garbage() {
        let bad = ApiClient::new("not a url", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            bad.endpoint_url("categories"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_feed_response_status_windows() {
        let response = |code: u16| FeedResponse {
            status: StatusCode::from_u16(code).unwrap(),
            last_modified: None,
            body: Vec::new(),
        };
        assert!(response(200).has_events());
        assert!(response(200).accepts_token());
        assert!(!response(304).has_events());
        assert!(response(304).accepts_token());
        assert!(!response(404).accepts_token());
    }

    #[test]
    fn test_decode_events_reports_malformed_body() {
        let response = FeedResponse {
            status: StatusCode::OK,
            last_modified: None,
            body: b"{\"message\": \"API rate limit exceeded\"}".to_vec(),
        };
        assert!(matches!(response.decode_events(), Err(ApiError::Decode(_))));
    }
}
