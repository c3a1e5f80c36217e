//! Wiring the engine to the real API, store and session file.

use std::sync::Arc;

use tech_map_cli_utils::{IndicatifProgress, MultiProgress};
use tech_map_engine::{EngineConfig, EngineError, PlanOutcome, TechMap};
use tech_map_geo::LatLng;
use tech_map_mode::ModeId;
use tech_map_place_models::PlaceDetail;
use tech_map_points::MemoryMarkerLayer;
use tech_map_source::lip::LipApi;
use tech_map_store::duckdb_store::DuckDbPlaceStore;
use tech_map_store::memory::MemoryPlaceStore;
use tech_map_store::{PlaceStore, paths};

/// Global flags.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub mode: Option<ModeId>,
    pub memory: bool,
    pub debug: bool,
}

/// Position flags; unset fields keep the saved session's value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Override {
    pub center: Option<LatLng>,
    pub zoom: Option<u8>,
}

/// Loads `tech_map.toml` from the project root, or defaults.
pub fn load_config() -> Result<EngineConfig, EngineError> {
    EngineConfig::load(&paths::config_path())
}

fn open_store(options: Options, config: &EngineConfig) -> Result<Arc<dyn PlaceStore>, EngineError> {
    if options.memory {
        log::debug!("Using in-memory place store");
        return Ok(Arc::new(MemoryPlaceStore::new()));
    }

    let path = paths::place_store_db_path();
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent).map_err(|e| EngineError::StoreInit(e.into()))?;
    }
    log::info!("Opening place store at {}", path.display());
    Ok(Arc::new(DuckDbPlaceStore::open_in_background(
        path,
        config.store_ready_timeout(),
    )))
}

/// Builds the map from the saved session plus `position`, starts it and
/// returns the outcome of the first fetch plan.
pub async fn open_map(
    multi: &MultiProgress,
    options: Options,
    position: Override,
) -> Result<(TechMap, PlanOutcome), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(options, &config)?;
    let api = Arc::new(LipApi::new(config.api.clone())?);
    let layer = Arc::new(MemoryMarkerLayer::new());

    let mut builder = TechMap::builder(config, api, store, layer)
        .session_path(paths::session_path())
        .debug(options.debug)
        .progress_factory(IndicatifProgress::factory(multi));

    if let Some(mode) = options.mode {
        builder = builder.mode(mode);
    }
    if position.center.is_some() || position.zoom.is_some() {
        let current = builder.current_position();
        builder = builder.position(
            position.center.unwrap_or(current.0),
            position.zoom.unwrap_or(current.1),
        );
    }

    let (map, _signals) = builder.build()?;

    let spinner = IndicatifProgress::spinner(multi, "Loading map");
    let outcome = map.start().await;
    spinner.finish_and_clear();

    Ok((map, outcome?))
}

/// Looks up one premise in the store and renders it in the chosen mode.
pub async fn place_detail(
    options: Options,
    id: &str,
) -> Result<Option<PlaceDetail>, Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(options, &config)?;
    store
        .wait_until_ready(config.store_ready_timeout())
        .await
        .map_err(EngineError::StoreInit)?;

    let classifier = tech_map_mode::for_id(options.mode.unwrap_or_default(), options.debug);
    Ok(store
        .get_place(id)
        .await?
        .map(|place| classifier.render_detail(&place)))
}
