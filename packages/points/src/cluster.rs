//! Cluster presentation: radius by zoom and the colour mix of members.

use serde::Serialize;
use tech_map_place_models::Color;

use crate::Marker;

/// Pixel radius within which markers merge into a cluster at `zoom`.
#[must_use]
pub const fn cluster_radius(zoom: u8) -> u32 {
    match zoom {
        0..=13 => 150,
        14 => 100,
        _ => 0,
    }
}

/// One band of a cluster's colour wheel, as cumulative percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorStop {
    /// Band colour.
    pub color: Color,
    /// Share of members with this colour.
    pub count: usize,
    /// Where the band starts, 0-100.
    pub start_pct: f64,
    /// Where the band ends, 0-100.
    pub end_pct: f64,
}

/// Colour bands for a set of member colours: most common first, ties in
/// first-seen order.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn color_mix(colors: &[Color]) -> Vec<ColorStop> {
    let mut counts: Vec<(Color, usize)> = Vec::new();
    for color in colors {
        match counts.iter_mut().find(|(c, _)| c == color) {
            Some((_, n)) => *n += 1,
            None => counts.push((*color, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total = colors.len() as f64;
    let mut start = 0.0;
    counts
        .into_iter()
        .map(|(color, count)| {
            let end = start + count as f64 / total * 100.0;
            let stop = ColorStop {
                color,
                count,
                start_pct: start,
                end_pct: end,
            };
            start = end;
            stop
        })
        .collect()
}

/// What a cluster icon shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterIcon {
    /// Number of markers in the cluster.
    pub child_count: usize,
    /// Colour bands.
    pub stops: Vec<ColorStop>,
}

/// Builds the icon for a cluster of `markers`.
#[must_use]
pub fn cluster_icon(markers: &[Marker]) -> ClusterIcon {
    let colors: Vec<Color> = markers.iter().map(|m| m.color).collect();
    ClusterIcon {
        child_count: markers.len(),
        stops: color_mix(&colors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_by_zoom() {
        assert_eq!(cluster_radius(5), 150);
        assert_eq!(cluster_radius(13), 150);
        assert_eq!(cluster_radius(14), 100);
        assert_eq!(cluster_radius(15), 0);
        assert_eq!(cluster_radius(18), 0);
    }

    #[test]
    fn mix_is_sorted_and_cumulative() {
        let green = Color("#1D7044");
        let red = Color("#E3071D");
        let stops = color_mix(&[red, green, green, green]);

        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].color, green);
        assert!((stops[0].end_pct - 75.0).abs() < 1e-9);
        assert!((stops[1].start_pct - 75.0).abs() < 1e-9);
        assert!((stops[1].end_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let a = Color("#000001");
        let b = Color("#000002");
        let stops = color_mix(&[b, a]);
        assert_eq!(stops[0].color, b);
        assert!(color_mix(&[]).is_empty());
    }
}
