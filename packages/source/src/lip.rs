//! HTTP adapter for the bulk premises map endpoint.
//!
//! Requests look like `{base}/{north}/{east}/{south}/{west}?page={page}`
//! with every coordinate rounded to two decimal places. The premises array
//! and the next page number are located in the response body through
//! configurable dot paths (`data.places` and `data.next` by default).

use std::time::Duration;

use async_trait::async_trait;
use tech_map_geo::{Bounds, GeoBox};
use tech_map_place_models::Place;

use crate::{ApiConfig, ApiPage, PremisesApi, Proceed, SourceError, retry};

/// [`PremisesApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct LipApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl LipApi {
    /// Creates an adapter with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("tech-map/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Builds the request URL for `bounds` and `page`. Pages below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn page_url(&self, bounds: &Bounds, page: u32) -> String {
        format!(
            "{}/{:.2}/{:.2}/{:.2}/{:.2}?page={}",
            self.config.base_url.trim_end_matches('/'),
            bounds.north,
            bounds.east,
            bounds.south,
            bounds.west,
            page.max(1),
        )
    }

    /// Extracts the premises and next page from a response body.
    ///
    /// Individual records that fail to decode are logged and skipped; a
    /// missing or non-array premises path is an error.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] if the premises array is absent.
    pub fn parse_page(&self, body: &serde_json::Value) -> Result<ApiPage, SourceError> {
        let records = resolve_path(body, &self.config.records_path)
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| SourceError::Malformed {
                message: format!(
                    "response does not contain an array at '{}'",
                    self.config.records_path
                ),
            })?;

        let mut places = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<Place>(record.clone()) {
                Ok(place) => places.push(place),
                Err(e) => log::warn!("Skipping undecodable premise record: {e}"),
            }
        }

        let next_page = resolve_path(body, &self.config.next_path).and_then(page_number);

        Ok(ApiPage { places, next_page })
    }
}

#[async_trait]
impl PremisesApi for LipApi {
    async fn fetch_page(
        &self,
        geo_box: &GeoBox,
        page: u32,
        proceed: Proceed<'_>,
    ) -> Result<ApiPage, SourceError> {
        let stale = || SourceError::Stale {
            box_label: geo_box.center_label(),
        };

        if !proceed() {
            return Err(stale());
        }

        let url = self.page_url(&geo_box.bounds, page);
        log::debug!("GET {url}");
        let body = retry::send_json(|| self.client.get(&url), self.config.max_retries).await?;

        if !proceed() {
            return Err(stale());
        }

        self.parse_page(&body)
    }
}

/// Walks a dot-separated path (e.g. `"data.places"`) into a JSON value.
fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Accepts a positive page number given as a JSON number or numeric
/// string. `null`, `false`, `0` and anything else mean "no next page".
fn page_number(value: &serde_json::Value) -> Option<u32> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_u64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|n| *n > 0)
}
