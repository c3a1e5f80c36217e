#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The tech map engine.
//!
//! Ties the grid tiler, the premises API, the place store, the mode
//! classifiers and the point aggregator together:
//!
//! - [`coordinator::FetchCoordinator`] turns the current viewport into a
//!   sequence of box fetches, skipping boxes already fetched in this mode
//!   and dropping results that no longer match what the user is looking at.
//! - [`map::TechMap`] is the session a front-end talks to: viewport
//!   changes, mode switches, legend counts, popups.
//! - [`progress`] tracks one progress item per fetch batch.
//! - [`events::MapSignal`] is how the engine talks back to a UI.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod map;
pub mod progress;
pub mod viewport;

#[cfg(test)]
mod testing;

use tech_map_geo::GeoError;
use tech_map_source::SourceError;
use tech_map_store::StoreError;
use thiserror::Error;

pub use config::{EngineConfig, ModeSwitchStrategy};
pub use coordinator::{BatchReport, FetchCoordinator, PlanOutcome};
pub use events::MapSignal;
pub use map::TechMap;
pub use viewport::{EpochKey, ViewportState};

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The place store did not become usable.
    #[error("Place store failed to initialise: {0}")]
    StoreInit(#[source] StoreError),

    /// A store call failed after initialisation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The premises API failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Invalid geometry or grid.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`EngineConfig`].
    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl EngineError {
    /// Whether this error only means the work was superseded.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Source(e) if e.is_stale())
    }
}
