//! Headless marker layer backed by an R-tree.
//!
//! Stands in for a map widget: it keeps the markers it was given, answers
//! bounds queries and can build popups for them, but draws nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use rstar::{AABB, RTree, RTreeObject};
use tech_map_geo::Bounds;
use tech_map_mode::ModeClassifier;
use tech_map_store::{PlaceStore, StoreError};

use crate::popup::{self, Popup};
use crate::{AggregatePoint, Marker, MarkerLayer};

/// Position of a marker in the R-tree, as `[lng, lat]`.
#[derive(Debug, Clone, PartialEq)]
struct MarkerEntry {
    key: String,
    position: [f64; 2],
}

impl RTreeObject for MarkerEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

#[derive(Default)]
struct State {
    tree: RTree<MarkerEntry>,
    points: HashMap<String, AggregatePoint>,
    handler: Option<(Arc<dyn ModeClassifier>, Arc<dyn PlaceStore>)>,
    add_calls: usize,
}

/// In-memory [`MarkerLayer`].
#[derive(Default)]
pub struct MemoryMarkerLayer {
    state: RwLock<State>,
}

impl std::fmt::Debug for MemoryMarkerLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMarkerLayer")
            .field("markers", &self.len())
            .finish_non_exhaustive()
    }
}

fn envelope_of(bounds: &Bounds) -> AABB<[f64; 2]> {
    AABB::from_corners([bounds.west, bounds.south], [bounds.east, bounds.north])
}

impl MemoryMarkerLayer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of markers currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().points.len()
    }

    /// Whether the layer holds no markers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times [`MarkerLayer::add_points`] has been called.
    #[must_use]
    pub fn add_calls(&self) -> usize {
        self.read().add_calls
    }

    /// The point behind marker `key`.
    #[must_use]
    pub fn point(&self, key: &str) -> Option<AggregatePoint> {
        self.read().points.get(key).cloned()
    }

    /// Builds the popup of marker `key` with the installed mode handler.
    ///
    /// Returns `Ok(None)` if the marker is unknown, no handler is installed
    /// or none of its members are in the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if loading the members fails.
    pub async fn popup(&self, key: &str) -> Result<Option<Popup>, StoreError> {
        let (point, handler) = {
            let state = self.read();
            (state.points.get(key).cloned(), state.handler.clone())
        };
        let (Some(point), Some((classifier, store))) = (point, handler) else {
            return Ok(None);
        };
        popup::build(&point, store.as_ref(), classifier.as_ref()).await
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MarkerLayer for MemoryMarkerLayer {
    fn add_points(&self, points: &BTreeMap<String, AggregatePoint>) {
        let mut state = self.write();
        state.add_calls += 1;

        let mut added = 0;
        for (key, point) in points {
            if state.points.insert(key.clone(), point.clone()).is_none() {
                state.tree.insert(MarkerEntry {
                    key: key.clone(),
                    position: [point.lng, point.lat],
                });
                added += 1;
            }
        }
        drop(state);

        log::trace!("Marker layer: {added} added, {} restyled", points.len() - added);
    }

    fn remove_markers_outside_bounds(&self, bounds: &Bounds) {
        let mut state = self.write();

        let outside: Vec<MarkerEntry> = state
            .tree
            .iter()
            .filter(|e| !bounds.contains(tech_map_geo::LatLng::new(e.position[1], e.position[0])))
            .cloned()
            .collect();

        for entry in &outside {
            state.tree.remove(entry);
            state.points.remove(&entry.key);
        }
        drop(state);

        if !outside.is_empty() {
            log::debug!("Removed {} markers outside {bounds}", outside.len());
        }
    }

    fn remove_all_markers(&self) {
        let mut state = self.write();
        state.tree = RTree::new();
        state.points.clear();
    }

    fn get_markers_within_bounds(&self, bounds: &Bounds) -> Vec<Marker> {
        let state = self.read();
        state
            .tree
            .locate_in_envelope(&envelope_of(bounds))
            .filter_map(|entry| {
                state
                    .points
                    .get(&entry.key)
                    .map(|point| Marker::from_point(&entry.key, point))
            })
            .collect()
    }

    fn set_mode_handler(&self, classifier: Arc<dyn ModeClassifier>, store: Arc<dyn PlaceStore>) {
        self.write().handler = Some((classifier, store));
    }
}

#[cfg(test)]
mod tests {
    use tech_map_place_models::{Color, Place};
    use tech_map_store::memory::MemoryPlaceStore;

    use super::*;
    use crate::PointMember;

    fn point(id: &str, lat: f64, lng: f64) -> (String, AggregatePoint) {
        let p = AggregatePoint {
            lat,
            lng,
            members: vec![PointMember {
                id: id.to_owned(),
                color: Color("#1D7044"),
                address: format!("{id} St"),
            }],
        };
        (p.key(), p)
    }

    fn layer_with(points: &[(&str, f64, f64)]) -> MemoryMarkerLayer {
        let layer = MemoryMarkerLayer::new();
        let batch: BTreeMap<String, AggregatePoint> =
            points.iter().map(|(id, lat, lng)| point(id, *lat, *lng)).collect();
        layer.add_points(&batch);
        layer
    }

    #[test]
    fn add_points_upserts_by_key() {
        let layer = layer_with(&[("A", -33.81, 151.19)]);

        let (key, mut updated) = point("A", -33.81, 151.19);
        updated.members.push(PointMember {
            id: "B".to_owned(),
            color: Color("#FFBE00"),
            address: "B St".to_owned(),
        });
        layer.add_points(&BTreeMap::from([(key.clone(), updated)]));

        assert_eq!(layer.len(), 1);
        assert_eq!(layer.point(&key).unwrap().members.len(), 2);
    }

    #[test]
    fn bounds_queries_and_pruning() {
        let layer = layer_with(&[("IN", -33.81, 151.19), ("OUT", -34.5, 150.0)]);
        let view = Bounds::new(-33.80, -33.82, 151.20, 151.18).unwrap();

        let inside = layer.get_markers_within_bounds(&view);
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].tooltip, "IN St");

        layer.remove_markers_outside_bounds(&view);
        assert_eq!(layer.len(), 1);
        assert!(layer.point("-34.5,150").is_none());
    }

    #[test]
    fn remove_all_empties_layer() {
        let layer = layer_with(&[("A", 1.0, 1.0), ("B", 2.0, 2.0)]);
        layer.remove_all_markers();
        assert!(layer.is_empty());
        let world = Bounds::new(90.0, -90.0, 180.0, -180.0).unwrap();
        assert!(layer.get_markers_within_bounds(&world).is_empty());
    }

    #[tokio::test]
    async fn popup_needs_mode_handler() {
        let layer = layer_with(&[("A", 1.0, 1.0)]);
        assert!(layer.popup("1,1").await.unwrap().is_none());

        let store = Arc::new(MemoryPlaceStore::new());
        let mut place = Place::new("A", 1.0, 1.0);
        place.address1 = "A St".to_owned();
        store.store_place(&place).await.unwrap();
        layer.set_mode_handler(tech_map_mode::for_id(tech_map_mode::ModeId::All, false), store);

        assert!(matches!(
            layer.popup("1,1").await.unwrap(),
            Some(Popup::Single(_))
        ));
    }
}
