//! Grid-aligned partitioning of bounds into fixed-size boxes.
//!
//! Box edges are integer multiples of the grid steps, so two overlapping
//! rectangles always produce bit-identical boxes for the overlapping part.
//! Boxes are identified by their integer grid indices rather than by float
//! corners, which keeps [`BoxKey`] exact and cheap to compare.

use serde::{Deserialize, Serialize};

use crate::{Bounds, GeoError, LatLng};

/// Ratios within this distance of an integer are treated as lying on the
/// grid line, absorbing float noise like `151.2 / 0.04 = 3779.9999999`.
const SNAP_EPSILON: f64 = 1e-9;

/// Grid granularity in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    lat_step: f64,
    lng_step: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            lat_step: 0.02,
            lng_step: 0.04,
        }
    }
}

impl GridSpec {
    /// Creates a grid with the given steps.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidStep`] if either step is not a positive
    /// finite number.
    pub fn new(lat_step: f64, lng_step: f64) -> Result<Self, GeoError> {
        if !(lat_step.is_finite() && lat_step > 0.0) {
            return Err(GeoError::InvalidStep {
                axis: "latitude",
                value: lat_step,
            });
        }
        if !(lng_step.is_finite() && lng_step > 0.0) {
            return Err(GeoError::InvalidStep {
                axis: "longitude",
                value: lng_step,
            });
        }
        Ok(Self { lat_step, lng_step })
    }

    /// Latitude step in degrees.
    #[must_use]
    pub const fn lat_step(&self) -> f64 {
        self.lat_step
    }

    /// Longitude step in degrees.
    #[must_use]
    pub const fn lng_step(&self) -> f64 {
        self.lng_step
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn lat_edge(&self, row: i64) -> f64 {
        row as f64 * self.lat_step
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn lng_edge(&self, col: i64) -> f64 {
        col as f64 * self.lng_step
    }
}

/// Identity of a grid box: the row of its northern edge and the column of
/// its western edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoxKey {
    /// `north = row * lat_step`.
    pub row: i64,
    /// `west = col * lng_step`.
    pub col: i64,
}

/// One grid-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBox {
    /// Grid identity used for fetch tracking.
    pub key: BoxKey,
    /// The box rectangle.
    pub bounds: Bounds,
}

impl GeoBox {
    /// Builds the box for `key` on `grid`.
    #[must_use]
    pub fn from_key(key: BoxKey, grid: &GridSpec) -> Self {
        Self {
            key,
            bounds: Bounds {
                north: grid.lat_edge(key.row),
                south: grid.lat_edge(key.row - 1),
                east: grid.lng_edge(key.col + 1),
                west: grid.lng_edge(key.col),
            },
        }
    }

    /// Centre point of the box.
    #[must_use]
    pub fn center(&self) -> LatLng {
        self.bounds.center()
    }

    /// The `"lat,lng"` centre string shown in logs and progress text.
    #[must_use]
    pub fn center_label(&self) -> String {
        let c = self.center();
        format!("{:.3},{:.3}", c.lat, c.lng)
    }
}

/// Row/column extents of the grid cells covering some bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GridSpan {
    pub north_row: i64,
    pub south_row: i64,
    pub west_col: i64,
    pub east_col: i64,
}

impl GridSpan {
    /// North and west snap outward (up and left); south and east are the
    /// first grid lines at or beyond the rectangle edge.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn covering(bounds: &Bounds, grid: &GridSpec) -> Self {
        Self {
            north_row: snapped_ratio(bounds.north, grid.lat_step).ceil() as i64,
            south_row: snapped_ratio(bounds.south, grid.lat_step).floor() as i64,
            west_col: snapped_ratio(bounds.west, grid.lng_step).floor() as i64,
            east_col: snapped_ratio(bounds.east, grid.lng_step).ceil() as i64,
        }
    }

    const fn rows(&self) -> i64 {
        let rows = self.north_row - self.south_row;
        if rows > 0 { rows } else { 0 }
    }

    const fn cols(&self) -> i64 {
        let cols = self.east_col - self.west_col;
        if cols > 0 { cols } else { 0 }
    }
}

fn snapped_ratio(value: f64, step: f64) -> f64 {
    let ratio = value / step;
    let nearest = ratio.round();
    if (ratio - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        ratio
    }
}

/// Returns how many boxes [`tile`] would produce, without building them.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn box_count(bounds: &Bounds, grid: &GridSpec) -> usize {
    let span = GridSpan::covering(bounds, grid);
    (span.rows() * span.cols()) as usize
}

/// Partitions `bounds` into grid boxes in north-to-south, west-to-east
/// scan order.
#[must_use]
pub fn tile(bounds: &Bounds, grid: &GridSpec) -> Vec<GeoBox> {
    let span = GridSpan::covering(bounds, grid);
    let mut boxes = Vec::with_capacity(box_count(bounds, grid));

    for row in ((span.south_row + 1)..=span.north_row).rev() {
        for col in span.west_col..span.east_col {
            boxes.push(GeoBox::from_key(BoxKey { row, col }, grid));
        }
    }

    boxes
}
