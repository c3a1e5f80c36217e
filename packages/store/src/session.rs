//! The start position remembered between runs.
//!
//! Read once at start-up to seed the first fetch plan and rewritten after
//! every viewport change or mode switch.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tech_map_geo::LatLng;
use tech_map_geo::projection::{DEFAULT_CENTER, DEFAULT_ZOOM};

use crate::StoreError;

/// Last viewport and mode selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Last map centre.
    pub center: LatLng,
    /// Last zoom level.
    pub zoom: u8,
    /// Id of the last selected mode.
    pub mode: String,
    /// Whether to centre on the user's location at start-up.
    #[serde(default)]
    pub geolocate: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            mode: "all".to_owned(),
            geolocate: false,
        }
    }
}

impl SessionState {
    /// Loads the session from `path`.
    ///
    /// A missing file yields `Ok(None)`. An unreadable record is logged and
    /// also treated as absent, so a corrupt file never blocks start-up.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }

        let text = std::fs::read_to_string(path)?;
        match serde_json::from_str(&text) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                log::warn!("Ignoring unreadable session at {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    /// Writes the session to `path`, creating the parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
