#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation of premises into map points.
//!
//! Premises sharing an exact coordinate collapse into one
//! [`AggregatePoint`] whose members are kept as a single list of
//! `{id, color, address}` records. The [`aggregator::PointAggregator`]
//! owns the coordinate map and pushes changes to a [`MarkerLayer`], the
//! boundary to whatever actually draws markers.

pub mod aggregator;
pub mod cluster;
pub mod legend;
pub mod memory_layer;
pub mod popup;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tech_map_geo::{Bounds, LatLng};
use tech_map_mode::ModeClassifier;
use tech_map_place_models::Color;
use tech_map_store::PlaceStore;

pub use aggregator::PointAggregator;
pub use memory_layer::MemoryMarkerLayer;

/// Builds the `"lat,lng"` key shared by every premise at one coordinate.
#[must_use]
pub fn point_key(lat: f64, lng: f64) -> String {
    format!("{lat},{lng}")
}

/// One premise inside a point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointMember {
    /// Premise id.
    pub id: String,
    /// Colour assigned by the mode that was active when it was added.
    pub color: Color,
    /// Tooltip label.
    pub address: String,
}

/// All premises at one exact coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatePoint {
    /// Latitude shared by every member.
    pub lat: f64,
    /// Longitude shared by every member.
    pub lng: f64,
    /// Members in the order they were first seen. Ids are unique.
    pub members: Vec<PointMember>,
}

impl AggregatePoint {
    /// Map key of this point.
    #[must_use]
    pub fn key(&self) -> String {
        point_key(self.lat, self.lng)
    }

    /// Position of this point.
    #[must_use]
    pub const fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Whether `id` is already a member.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Member ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    /// Marker colour: the first member represents the point.
    #[must_use]
    pub fn color(&self) -> Color {
        self.members.first().map_or(Color::UNKNOWN, |m| m.color)
    }

    /// Tooltip text, e.g. `"1 Main St ( + 2 more)"`.
    #[must_use]
    pub fn tooltip(&self) -> String {
        self.members
            .first()
            .map(|m| tech_map_mode::summary_label(&m.address, self.members.len()))
            .unwrap_or_default()
    }
}

/// A rendered marker as reported back by a [`MarkerLayer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Point key.
    pub key: String,
    /// Marker position.
    pub position: LatLng,
    /// Fill colour.
    pub color: Color,
    /// Number of premises behind the marker.
    pub member_count: usize,
    /// Tooltip text.
    pub tooltip: String,
}

impl Marker {
    /// Snapshot of `point` as a marker.
    #[must_use]
    pub fn from_point(key: &str, point: &AggregatePoint) -> Self {
        Self {
            key: key.to_owned(),
            position: point.position(),
            color: point.color(),
            member_count: point.members.len(),
            tooltip: point.tooltip(),
        }
    }
}

/// Draws and removes point markers.
///
/// Implementations use interior mutability; every method may be called
/// from any task.
pub trait MarkerLayer: Send + Sync {
    /// Upserts markers by key. Existing markers are restyled in place.
    fn add_points(&self, points: &BTreeMap<String, AggregatePoint>);

    /// Drops markers whose position lies outside `bounds`.
    fn remove_markers_outside_bounds(&self, bounds: &Bounds);

    /// Drops every marker.
    fn remove_all_markers(&self);

    /// Markers whose position lies inside `bounds` (edges included).
    fn get_markers_within_bounds(&self, bounds: &Bounds) -> Vec<Marker>;

    /// Installs the classifier and store used for popups.
    fn set_mode_handler(&self, classifier: Arc<dyn ModeClassifier>, store: Arc<dyn PlaceStore>);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, color: &'static str, address: &str) -> PointMember {
        PointMember {
            id: id.to_owned(),
            color: Color(color),
            address: address.to_owned(),
        }
    }

    #[test]
    fn key_uses_shortest_float_form() {
        assert_eq!(point_key(-33.81, 151.2), "-33.81,151.2");
    }

    #[test]
    fn first_member_represents_point() {
        let point = AggregatePoint {
            lat: -33.81,
            lng: 151.2,
            members: vec![member("A", "#1D7044", "Unit 1"), member("B", "#FFBE00", "Unit 2")],
        };
        assert_eq!(point.color(), Color("#1D7044"));
        assert_eq!(point.tooltip(), "Unit 1 ( + 1 more)");
        assert!(point.contains("B"));
        assert_eq!(point.key(), "-33.81,151.2");
    }
}
