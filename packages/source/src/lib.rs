#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote premises API contract.
//!
//! The fetch coordinator only ever talks to a [`PremisesApi`]: given a grid
//! box and a 1-based page number it returns one page of premises and,
//! optionally, the number of the next page. [`lip::LipApi`] is the HTTP
//! adapter for the public bulk map endpoint.

pub mod lip;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tech_map_geo::GeoBox;
use tech_map_place_models::Place;

/// Errors that can occur while fetching premises.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// A page request did not complete in time.
    #[error("Page request timed out after {seconds}s")]
    Timeout {
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// The viewport moved away from the box before the request was issued
    /// or before its response was processed.
    #[error("Request for box {box_label} superseded by a viewport change")]
    Stale {
        /// Centre label of the box.
        box_label: String,
    },

    /// The response did not have the expected shape.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of what was wrong.
        message: String,
    },
}

impl SourceError {
    /// Whether this is a superseded request rather than a real failure.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::Stale { .. } | Self::Malformed { .. } => false,
        }
    }
}

/// One page of premises for a box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiPage {
    /// Premises on this page.
    pub places: Vec<Place>,
    /// The next page to request, if any.
    pub next_page: Option<u32>,
}

/// Guard consulted by the adapter right before issuing a request and
/// right before handing back a response. Returning `false` turns the call
/// into [`SourceError::Stale`].
pub type Proceed<'a> = &'a (dyn Fn() -> bool + Send + Sync);

/// A paginated source of premises keyed by grid box.
#[async_trait]
pub trait PremisesApi: Send + Sync {
    /// Fetches `page` (1-based) of the premises inside `geo_box`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Stale`] if `proceed` reports the box is no
    /// longer wanted, or another [`SourceError`] if the request fails.
    async fn fetch_page(
        &self,
        geo_box: &GeoBox,
        page: u32,
        proceed: Proceed<'_>,
    ) -> Result<ApiPage, SourceError>;
}

/// Connection settings for the HTTP adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Endpoint prefix; bounds and page are appended.
    pub base_url: String,
    /// Dot path to the premises array in the response body.
    pub records_path: String,
    /// Dot path to the next page number in the response body.
    pub next_path: String,
    /// Connection-level retries for transient failures.
    pub max_retries: u32,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

/// Environment variable that overrides [`ApiConfig::base_url`].
pub const API_URL_ENV: &str = "TECH_MAP_API_URL";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.lip.net.au/nbn-bulk/map".to_owned(),
            records_path: "data.places".to_owned(),
            next_path: "data.next".to_owned(),
            max_retries: 3,
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Applies the `TECH_MAP_API_URL` override, if set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.is_empty()
        {
            log::debug!("Using API endpoint from {API_URL_ENV}: {url}");
            self.base_url = url;
        }
        self
    }
}
