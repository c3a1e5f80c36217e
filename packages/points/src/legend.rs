//! Legend rows with marker counts.

use tech_map_place_models::LegendItem;

use crate::Marker;

/// Fills in `count` on each legend row from the markers in view.
///
/// A marker counts toward the first row with its colour; rows that share
/// a colour with an earlier row keep a count of zero. Markers whose colour
/// has no row are not counted.
#[must_use]
pub fn count_markers(entries: Vec<LegendItem>, markers: &[Marker]) -> Vec<LegendItem> {
    let mut entries: Vec<LegendItem> = entries
        .into_iter()
        .map(|mut e| {
            e.count = Some(0);
            e
        })
        .collect();

    for marker in markers {
        if let Some(entry) = entries.iter_mut().find(|e| e.color == marker.color)
            && let Some(count) = entry.count.as_mut()
        {
            *count += 1;
        }
    }

    entries
}
