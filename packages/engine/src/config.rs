//! Engine configuration, read from `tech_map.toml`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tech_map_geo::tiler::GridSpec;
use tech_map_source::ApiConfig;

use crate::EngineError;

/// What happens to already-fetched boxes when the mode changes.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModeSwitchStrategy {
    /// Replay boxes from the place store through the new classifier.
    #[default]
    Reclassify,
    /// Fetch every box from the API again.
    Refetch,
}

/// Tunables for the fetch engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lat_step: f64,
    pub lng_step: f64,
    /// Below this zoom nothing is fetched.
    pub min_zoom: u8,
    /// A plan needing more boxes than this is refused.
    pub max_boxes: usize,
    /// Pagination safety ceiling per box.
    pub max_pages_per_box: u32,
    pub page_timeout_secs: u64,
    /// Finished progress items are swept after this long.
    pub progress_expiry_secs: u64,
    /// Markers outside the viewport padded by this ratio are removed.
    pub marker_padding: f64,
    /// Ratio the viewport is padded by before tiling.
    pub fetch_padding: f64,
    pub store_ready_timeout_secs: u64,
    pub mode_switch: ModeSwitchStrategy,
    pub api: ApiConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lat_step: 0.02,
            lng_step: 0.04,
            min_zoom: 11,
            max_boxes: 100,
            max_pages_per_box: 50,
            page_timeout_secs: 30,
            progress_expiry_secs: 5,
            marker_padding: 0.5,
            fetch_padding: 0.0,
            store_ready_timeout_secs: 10,
            mode_switch: ModeSwitchStrategy::default(),
            api: ApiConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads the config at `path`, falling back to defaults when the file
    /// does not exist. Environment overrides are applied either way.
    ///
    /// # Errors
    ///
    /// * If the file exists but cannot be read
    /// * If the file is not valid TOML for this struct
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let config = if path.exists() {
            let text =
                std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
                    path: path.display().to_string(),
                    source,
                })?;
            let config = Self::from_toml(&text)?;
            log::info!("Loaded config from {}", path.display());
            config
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        Ok(config.with_env_overrides())
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// * If the document is not valid TOML for this struct
    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies environment overrides to nested sections.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.api = self.api.with_env_overrides();
        self
    }

    /// The tiling grid.
    ///
    /// # Errors
    ///
    /// * If either step is not a positive finite number
    pub fn grid(&self) -> Result<GridSpec, EngineError> {
        Ok(GridSpec::new(self.lat_step, self.lng_step)?)
    }

    #[must_use]
    pub const fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    #[must_use]
    pub const fn progress_expiry(&self) -> Duration {
        Duration::from_secs(self.progress_expiry_secs)
    }

    #[must_use]
    pub const fn store_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.store_ready_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            min_zoom = 13
            mode_switch = "refetch"

            [api]
            max_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.min_zoom, 13);
        assert_eq!(config.mode_switch, ModeSwitchStrategy::Refetch);
        assert_eq!(config.api.max_retries, 1);
        assert_eq!(config.api.records_path, "data.places");
        assert_eq!(config.max_boxes, 100);
    }

    #[test]
    fn bad_strategy_is_rejected() {
        let err = EngineConfig::from_toml(r#"mode_switch = "sometimes""#).unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse(_)));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("tech_map_engine_no_such_config.toml");
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_pages_per_box, 50);
    }

    #[test]
    fn invalid_grid_is_an_error() {
        let config = EngineConfig {
            lat_step: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.grid(), Err(EngineError::Geo(_))));
    }

    #[test]
    fn strategy_parses_from_str() {
        assert_eq!(
            "reclassify".parse::<ModeSwitchStrategy>().unwrap(),
            ModeSwitchStrategy::Reclassify
        );
        assert_eq!(ModeSwitchStrategy::Refetch.to_string(), "refetch");
    }
}
