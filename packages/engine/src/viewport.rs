//! The watched viewport and the epoch key derived from it.

use serde::Serialize;
use tech_map_geo::{Bounds, Viewport};
use tokio::sync::watch;

/// Identifies one fetch batch: where the map was, how far in, and under
/// which mode generation.
///
/// Any change of the three means results of an older batch no longer
/// describe what the user is looking at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EpochKey {
    /// Exact centre, `"lat,lng"` in shortest float form.
    pub center: String,
    pub zoom: u8,
    pub mode_generation: u64,
}

impl std::fmt::Display for EpochKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.center, self.zoom, self.mode_generation)
    }
}

/// The value published on the viewport channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewportState {
    pub viewport: Viewport,
    /// Bumped on every mode switch.
    pub mode_generation: u64,
}

impl ViewportState {
    #[must_use]
    pub const fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            mode_generation: 0,
        }
    }

    /// The epoch this state belongs to.
    #[must_use]
    pub fn epoch(&self) -> EpochKey {
        let center = self.viewport.center;
        EpochKey {
            center: format!("{},{}", center.lat, center.lng),
            zoom: self.viewport.zoom,
            mode_generation: self.mode_generation,
        }
    }

    #[must_use]
    pub const fn bounds(&self) -> &Bounds {
        &self.viewport.bounds
    }
}

/// Creates the viewport channel seeded with `viewport`.
#[must_use]
pub fn channel(viewport: Viewport) -> (watch::Sender<ViewportState>, watch::Receiver<ViewportState>) {
    watch::channel(ViewportState::new(viewport))
}
