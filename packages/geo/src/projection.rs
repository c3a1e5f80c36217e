//! Web-Mercator viewport maths.
//!
//! The map widget is external; all the core needs from it is the visible
//! rectangle for a centre, zoom and pixel size, computed the same way a
//! slippy map with 256px tiles does.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{Bounds, GeoError, LatLng};

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Default start view: centred over Australia.
pub const DEFAULT_CENTER: LatLng = LatLng::new(-26.177_228_8, 133.417_011_9);

/// Default start zoom.
pub const DEFAULT_ZOOM: u8 = 10;

/// What the map is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Map centre.
    pub center: LatLng,
    /// Integer zoom level.
    pub zoom: u8,
    /// Visible rectangle.
    pub bounds: Bounds,
}

impl Viewport {
    /// Builds the viewport of a `width_px` x `height_px` map centred on
    /// `center` at `zoom`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the centre is not finite or the pixel size
    /// is zero.
    pub fn from_center(
        center: LatLng,
        zoom: u8,
        width_px: u32,
        height_px: u32,
    ) -> Result<Self, GeoError> {
        if !(center.lat.is_finite() && center.lng.is_finite()) {
            return Err(GeoError::NonFinite { context: "centre" });
        }

        let world = world_size(zoom);
        let (cx, cy) = project(center, world);
        let half_w = f64::from(width_px) / 2.0;
        let half_h = f64::from(height_px) / 2.0;

        let north_west = unproject(cx - half_w, cy - half_h, world);
        let south_east = unproject(cx + half_w, cy + half_h, world);

        let bounds = Bounds::new(north_west.lat, south_east.lat, south_east.lng, north_west.lng)?;

        Ok(Self {
            center,
            zoom,
            bounds,
        })
    }

    /// Wraps explicit bounds; the centre is derived from them.
    #[must_use]
    pub fn from_bounds(bounds: Bounds, zoom: u8) -> Self {
        Self {
            center: bounds.center(),
            zoom,
            bounds,
        }
    }
}

fn world_size(zoom: u8) -> f64 {
    TILE_SIZE * 2f64.powi(i32::from(zoom))
}

fn project(point: LatLng, world: f64) -> (f64, f64) {
    let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (point.lng + 180.0) / 360.0 * world;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
    (x, y)
}

fn unproject(x: f64, y: f64, world: f64) -> LatLng {
    let lng = x / world * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y / world);
    let lat = n.sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_centred() {
        let center = LatLng::new(-33.8688, 151.2093);
        let vp = Viewport::from_center(center, 14, 1024, 768).unwrap();

        assert!(vp.bounds.contains(center));
        assert!((vp.bounds.center().lng - center.lng).abs() < 1e-9);
        // Mercator stretches latitude, so only approximately centred.
        assert!((vp.bounds.center().lat - center.lat).abs() < 1e-3);
    }

    #[test]
    fn zooming_in_halves_the_span() {
        let center = LatLng::new(-33.8688, 151.2093);
        let z13 = Viewport::from_center(center, 13, 800, 600).unwrap().bounds;
        let z14 = Viewport::from_center(center, 14, 800, 600).unwrap().bounds;

        let ratio = (z13.east - z13.west) / (z14.east - z14.west);
        assert!((ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn longitude_span_matches_tile_maths() {
        let vp = Viewport::from_center(LatLng::new(0.0, 0.0), 0, 256, 256).unwrap();
        assert!((vp.bounds.east - vp.bounds.west - 360.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_size() {
        assert!(Viewport::from_center(LatLng::new(0.0, 0.0), 12, 0, 100).is_err());
    }

    #[test]
    fn serializes_for_session_state() {
        let vp = Viewport::from_center(DEFAULT_CENTER, DEFAULT_ZOOM, 100, 100).unwrap();
        let json = serde_json::to_string(&vp).unwrap();
        let back: Viewport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.zoom, DEFAULT_ZOOM);
    }
}
