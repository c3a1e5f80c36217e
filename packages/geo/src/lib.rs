#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic primitives for the tech map.
//!
//! [`Bounds`] is the rectangle every other layer speaks in. The [`tiler`]
//! module partitions bounds into grid-aligned boxes used as the unit of
//! fetch deduplication, and [`projection`] turns a map centre and zoom into
//! the bounds actually on screen.

pub mod projection;
pub mod tiler;

use geo::{Intersects, Rect, coord};
use serde::{Deserialize, Serialize};

pub use projection::Viewport;
pub use tiler::{BoxKey, GeoBox, GridSpec};

/// Errors produced by geometric validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// North is not above south, or east is not right of west.
    #[error("Degenerate bounds: north={north} south={south} east={east} west={west}")]
    Degenerate {
        /// Northern edge.
        north: f64,
        /// Southern edge.
        south: f64,
        /// Eastern edge.
        east: f64,
        /// Western edge.
        west: f64,
    },

    /// A coordinate was NaN or infinite.
    #[error("Non-finite coordinate in {context}")]
    NonFinite {
        /// Where the value came from.
        context: &'static str,
    },

    /// A grid step was zero, negative or non-finite.
    #[error("Invalid grid step {value} for {axis}")]
    InvalidStep {
        /// `"latitude"` or `"longitude"`.
        axis: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// An axis-aligned geographic rectangle.
///
/// Antimeridian crossing is not supported; `east` is always greater than
/// `west`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Northern edge (max latitude).
    pub north: f64,
    /// Southern edge (min latitude).
    pub south: f64,
    /// Eastern edge (max longitude).
    pub east: f64,
    /// Western edge (min longitude).
    pub west: f64,
}

impl Bounds {
    /// Creates validated bounds.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::NonFinite`] if any edge is NaN or infinite, or
    /// [`GeoError::Degenerate`] if `north <= south` or `east <= west`.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, GeoError> {
        if ![north, south, east, west].iter().all(|v| v.is_finite()) {
            return Err(GeoError::NonFinite { context: "bounds" });
        }
        if north <= south || east <= west {
            return Err(GeoError::Degenerate {
                north,
                south,
                east,
                west,
            });
        }
        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// Centre of the rectangle.
    #[must_use]
    pub fn center(&self) -> LatLng {
        LatLng::new(
            f64::midpoint(self.north, self.south),
            f64::midpoint(self.east, self.west),
        )
    }

    /// Whether `point` lies inside or on the edge of the rectangle.
    #[must_use]
    pub fn contains(&self, point: LatLng) -> bool {
        point.lat <= self.north
            && point.lat >= self.south
            && point.lng <= self.east
            && point.lng >= self.west
    }

    /// Whether the two rectangles overlap or touch.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.to_rect().intersects(&other.to_rect())
    }

    /// Grows the rectangle by `ratio` of its height and width on every
    /// side. A ratio of `0.5` doubles both dimensions.
    #[must_use]
    pub fn pad(&self, ratio: f64) -> Self {
        let lat_buffer = (self.north - self.south) * ratio;
        let lng_buffer = (self.east - self.west) * ratio;
        Self {
            north: self.north + lat_buffer,
            south: self.south - lat_buffer,
            east: self.east + lng_buffer,
            west: self.west - lng_buffer,
        }
    }

    /// Snaps every edge outward to the nearest grid line.
    #[must_use]
    pub fn round_to_grid(&self, grid: &GridSpec) -> Self {
        let span = tiler::GridSpan::covering(self, grid);
        Self {
            north: grid.lat_edge(span.north_row),
            south: grid.lat_edge(span.south_row),
            east: grid.lng_edge(span.east_col),
            west: grid.lng_edge(span.west_col),
        }
    }

    fn to_rect(self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.north },
        )
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N{} S{} E{} W{}",
            self.north, self.south, self.east, self.west
        )
    }
}
