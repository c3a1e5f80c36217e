#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Local persistence for premise records.
//!
//! The map fetches premises incrementally and may hold millions of them
//! over a session, so they live in a [`PlaceStore`] keyed by id rather
//! than in the aggregation layer. Two backends are provided: an in-memory
//! map ([`memory::MemoryPlaceStore`]) and a `DuckDB` file
//! ([`duckdb_store::DuckDbPlaceStore`]).
//!
//! The crate also owns the data directory layout ([`paths`]) and the
//! small session record remembered between runs ([`session`]).

#[cfg(feature = "duckdb")]
pub mod duckdb_store;
pub mod memory;
pub mod paths;
pub mod session;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tech_map_place_models::Place;

/// How often [`PlaceStore::wait_until_ready`] re-checks readiness.
pub(crate) const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that can occur during place store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store did not become ready within the allowed time.
    #[error("Place store not ready after {seconds} seconds")]
    NotReady {
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// The store failed to open and will never become ready.
    #[error("Place store failed to open: {message}")]
    OpenFailed {
        /// Description of the failure.
        message: String,
    },

    /// Database error.
    #[cfg(feature = "duckdb")]
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// A stored record could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking worker task panicked or was cancelled.
    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Persists premise records keyed by id.
///
/// Upserts replace whole records. Batch reads are best-effort: ids that
/// are not stored are silently left out of the result.
#[async_trait]
pub trait PlaceStore: Send + Sync {
    /// Whether the store can currently serve requests.
    fn is_ready(&self) -> bool;

    /// Waits until [`Self::is_ready`] returns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotReady`] once `timeout` has elapsed.
    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), StoreError> {
        let started = Instant::now();
        loop {
            if self.is_ready() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(StoreError::NotReady {
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Inserts or replaces one place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn store_place(&self, place: &Place) -> Result<(), StoreError> {
        self.store_places(std::slice::from_ref(place)).await
    }

    /// Inserts or replaces a batch of places in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn store_places(&self, places: &[Place]) -> Result<(), StoreError>;

    /// Fetches one place by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_place(&self, id: &str) -> Result<Option<Place>, StoreError> {
        let mut found = self.get_places(&[id.to_owned()]).await?;
        Ok(found.pop())
    }

    /// Fetches places by id, preserving the order of `ids` and omitting
    /// ids that are not stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_places(&self, ids: &[String]) -> Result<Vec<Place>, StoreError>;

    /// Number of stored places.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Removes every stored place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn clear(&self) -> Result<(), StoreError>;
}
