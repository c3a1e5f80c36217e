//! Signals from the engine to whatever is showing the map.

use serde::Serialize;
use tech_map_mode::ModeId;
use tech_map_place_models::LegendItem;
use tokio::sync::mpsc;

use crate::coordinator::BatchReport;
use crate::progress::ProgressItem;
use crate::viewport::EpochKey;

/// Something a UI should react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum MapSignal {
    /// The map is zoomed out too far to fetch anything.
    ZoomInRequired { zoom: u8, min_zoom: u8 },
    /// The view needs more boxes than a plan may fetch.
    TooManyBoxes { count: usize, max: usize },
    /// Any zoom warning can be hidden.
    ZoomWarningCleared,
    FetchStarted { epoch: EpochKey, total: usize },
    ProgressUpdated(ProgressItem),
    FetchFinished(BatchReport),
    /// Legend rows with counts for the current view.
    LegendUpdated(Vec<LegendItem>),
    ModeChanged(ModeId),
}

/// Sending half used by the engine.
pub type SignalSender = mpsc::UnboundedSender<MapSignal>;

/// Sends `signal`, ignoring a closed receiver.
pub fn emit(sender: &SignalSender, signal: MapSignal) {
    if sender.send(signal).is_err() {
        log::trace!("No signal receiver");
    }
}
