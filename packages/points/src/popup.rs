//! Popup content for a clicked point.

use serde::Serialize;
use tech_map_mode::ModeClassifier;
use tech_map_place_models::{Color, PlaceDetail};
use tech_map_store::{PlaceStore, StoreError};

use crate::AggregatePoint;

/// One tab of a multi-premise popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupEntry {
    /// Tab label (the premise address).
    pub label: String,
    /// Premise colour in the active mode.
    pub color: Color,
    /// Full detail of the premise.
    pub detail: PlaceDetail,
}

/// What to show when a point is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Popup {
    /// The point has exactly one stored premise.
    Single(PlaceDetail),
    /// The point has several premises, sorted by address.
    Multi {
        /// One entry per premise.
        entries: Vec<PopupEntry>,
    },
}

/// Loads the members of `point` from `store` and renders them with
/// `classifier`.
///
/// Members missing from the store are left out. Returns `Ok(None)` when
/// none of them are stored.
///
/// # Errors
///
/// Returns [`StoreError`] if the store read fails.
pub async fn build(
    point: &AggregatePoint,
    store: &dyn PlaceStore,
    classifier: &dyn ModeClassifier,
) -> Result<Option<Popup>, StoreError> {
    let mut places = store.get_places(&point.ids()).await?;

    if places.len() <= 1 {
        return Ok(places.pop().map(|p| Popup::Single(classifier.render_detail(&p))));
    }

    places.sort_by(|a, b| a.address1.cmp(&b.address1));

    let entries = places
        .iter()
        .map(|place| PopupEntry {
            label: place.address_label().to_owned(),
            color: classifier.color_for(place),
            detail: classifier.render_detail(place),
        })
        .collect();

    Ok(Some(Popup::Multi { entries }))
}
