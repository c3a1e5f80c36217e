//! Coordinate-keyed aggregation of premises into points.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tech_map_mode::ModeClassifier;
use tech_map_place_models::Place;

use crate::{AggregatePoint, MarkerLayer, PointMember, point_key};

/// What one [`PointAggregator::add_premises`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Points created by this batch.
    pub new_points: usize,
    /// Members appended to points that already existed.
    pub new_members: usize,
    /// Premises rejected by the mode filter.
    pub filtered: usize,
}

/// Owns the coordinate to point map for one mode epoch and keeps the
/// marker layer in sync with it.
pub struct PointAggregator {
    points: HashMap<String, AggregatePoint>,
    layer: Arc<dyn MarkerLayer>,
}

impl std::fmt::Debug for PointAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointAggregator")
            .field("points", &self.points.len())
            .finish_non_exhaustive()
    }
}

impl PointAggregator {
    /// Creates an empty aggregator drawing onto `layer`.
    #[must_use]
    pub fn new(layer: Arc<dyn MarkerLayer>) -> Self {
        Self {
            points: HashMap::new(),
            layer,
        }
    }

    /// Aggregates a batch of premises.
    ///
    /// Premises the classifier filters out are skipped. Ids already present
    /// at their coordinate are ignored, so feeding the same batch twice is
    /// a no-op. Every point touched by the batch is handed to the marker
    /// layer in a single call.
    pub fn add_premises(&mut self, premises: &[Place], classifier: &dyn ModeClassifier) -> AddOutcome {
        let mut outcome = AddOutcome::default();
        let mut changed: BTreeMap<String, AggregatePoint> = BTreeMap::new();

        for place in premises {
            if !classifier.filter(place) {
                outcome.filtered += 1;
                continue;
            }

            let key = point_key(place.latitude, place.longitude);
            let member = PointMember {
                id: place.id.clone(),
                color: classifier.color_for(place),
                address: place.address_label().to_owned(),
            };

            let point = match self.points.entry(key.clone()) {
                Entry::Occupied(entry) => {
                    let point = entry.into_mut();
                    if point.contains(&member.id) {
                        continue;
                    }
                    point.members.push(member);
                    outcome.new_members += 1;
                    point
                }
                Entry::Vacant(entry) => {
                    outcome.new_points += 1;
                    entry.insert(AggregatePoint {
                        lat: place.latitude,
                        lng: place.longitude,
                        members: vec![member],
                    })
                }
            };
            changed.insert(key, point.clone());
        }

        if !changed.is_empty() {
            log::debug!(
                "Aggregated {} premises: {} new points, {} new members",
                premises.len(),
                outcome.new_points,
                outcome.new_members
            );
            self.layer.add_points(&changed);
        }

        outcome
    }

    /// Drops every point and asks the layer to remove all markers.
    pub fn reset_all(&mut self) {
        self.points.clear();
        self.layer.remove_all_markers();
    }

    /// The point at `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AggregatePoint> {
        self.points.get(key)
    }

    /// Tooltip of the point at `key`.
    #[must_use]
    pub fn tooltip(&self, key: &str) -> Option<String> {
        self.points.get(key).map(AggregatePoint::tooltip)
    }

    /// All points, in no particular order.
    pub fn points(&self) -> impl Iterator<Item = &AggregatePoint> {
        self.points.values()
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total number of premises across all points.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.points.values().map(|p| p.members.len()).sum()
    }
}
